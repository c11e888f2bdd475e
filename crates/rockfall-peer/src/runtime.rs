use std::future::Future;
use std::time::Duration;

use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

use rockfall_core::net::messages::{GameEndedMsg, Message};
use rockfall_core::net::protocol::{decode_message, encode_message};
use rockfall_core::{PeerSession, SessionConfig};

use crate::bot::Pilot;
use crate::config::PeerConfig;
use crate::error::PeerError;

/// Longest simulated step after a stall.
const MAX_DT: f32 = 0.05;

type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, WsMessage>;

/// How a peer run finished.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// The relay settled the game.
    Ended(GameEndedMsg),
    /// The shutdown signal fired first.
    Left,
    /// The relay refused the join.
    Rejected(String),
}

/// Outbound half of the relay connection. After the first send failure it
/// goes quiet and the session keeps ticking on its last known state.
struct Uplink {
    sink: WsSink,
    connected: bool,
}

impl Uplink {
    async fn send(&mut self, msg: &Message) {
        if !self.connected {
            return;
        }
        let data = match encode_message(msg) {
            Ok(d) => d,
            Err(e) => {
                tracing::warn!(msg_type = ?msg.message_type(), error = %e, "Dropping unencodable message");
                return;
            },
        };
        if let Err(e) = self.sink.send(WsMessage::Binary(data.into())).await {
            tracing::warn!(error = %e, "Relay connection lost, continuing on stale mirrors");
            self.connected = false;
        }
    }
}

/// Spawn the socket reader. It only decodes frames and hands them to the
/// tick loop; undecodable frames are dropped here.
fn spawn_reader(
    mut stream: futures::stream::SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>,
    tx: mpsc::UnboundedSender<Message>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(Ok(frame)) = stream.next().await {
            let data = match frame {
                WsMessage::Binary(d) => d,
                WsMessage::Close(_) => break,
                _ => continue,
            };
            match decode_message(&data) {
                Ok(msg) => {
                    if tx.send(msg).is_err() {
                        break;
                    }
                },
                Err(e) => tracing::debug!(error = %e, "Dropping undecodable frame"),
            }
        }
        tracing::debug!("Relay reader finished");
    })
}

/// Connect to the relay, join the room and tick the session until the game
/// ends, the join is refused, or `shutdown` resolves.
pub async fn run<F>(
    config: &PeerConfig,
    session_config: SessionConfig,
    shutdown: F,
) -> Result<Outcome, PeerError>
where
    F: Future<Output = ()>,
{
    let (ws, _) = connect_async(config.relay_url.as_str())
        .await
        .map_err(|e| PeerError::Connect(e.to_string()))?;
    let (mut sink, stream) = ws.split();

    let mut pilot = Pilot::new(session_config.seed);
    let mut session = PeerSession::new(config.identity.clone(), session_config);

    let join = encode_message(&session.join_message(&config.room, &config.token))?;
    sink.send(WsMessage::Binary(join.into()))
        .await
        .map_err(|e| PeerError::Transport(e.to_string()))?;
    tracing::info!(room = %config.room, peer = %config.identity, "Join sent");

    let (tx, mut rx) = mpsc::unbounded_channel();
    let reader = spawn_reader(stream, tx);
    let mut uplink = Uplink {
        sink,
        connected: true,
    };

    let tick_interval = Duration::from_secs_f32(1.0 / config.tick_rate_hz);
    let mut interval = tokio::time::interval(tick_interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut last_tick = Instant::now();
    let mut inbound_open = true;
    tokio::pin!(shutdown);

    let outcome = loop {
        tokio::select! {
            _ = &mut shutdown => break Outcome::Left,
            _ = interval.tick() => {
                let now = Instant::now();
                let dt = now.duration_since(last_tick).as_secs_f32().min(MAX_DT);
                last_tick = now;

                while inbound_open {
                    match rx.try_recv() {
                        Ok(msg) => session.enqueue(msg),
                        Err(TryRecvError::Empty) => break,
                        Err(TryRecvError::Disconnected) => {
                            tracing::warn!(peer = %config.identity, "Relay closed the connection");
                            inbound_open = false;
                        },
                    }
                }

                let input = pilot.next_input(dt, &session);
                for msg in session.tick(dt, &input) {
                    uplink.send(&msg).await;
                }

                if let Some(reason) = session.rejection() {
                    break Outcome::Rejected(reason.to_string());
                }
                if let Some(results) = session.results() {
                    log_results(results);
                    break Outcome::Ended(results.clone());
                }
            }
        }
    };

    if !matches!(outcome, Outcome::Rejected(_)) {
        uplink.send(&session.leave_message()).await;
    }
    if uplink.connected {
        let _ = uplink.sink.close().await;
    }
    reader.abort();
    tracing::info!(peer = %config.identity, ?outcome, "Peer stopped");
    Ok(outcome)
}

fn log_results(results: &GameEndedMsg) {
    tracing::info!(
        reason = %results.reason,
        winner = ?results.winner,
        "Game ended"
    );
    for (rank, standing) in results.standings.iter().enumerate() {
        tracing::info!(
            rank = rank + 1,
            peer = %standing.identity,
            score = standing.score,
            hp = standing.hp,
            alive = standing.alive,
            "Final standing"
        );
    }
}
