use axum::extract::ws::{Message as WsMessage, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;

use rockfall_core::net::messages::{
    GameEndVoteMsg, JoinMsg, JoinRejectedMsg, Message, MessageType, Route,
};
use rockfall_core::net::protocol::{
    MAX_MESSAGE_SIZE, decode_message_type, decode_payload, encode_message,
};

use crate::AppState;

pub async fn relay_ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_relay_socket(socket, state))
}

async fn handle_relay_socket(socket: WebSocket, state: AppState) {
    let (mut ws_sender, mut ws_receiver) = socket.split();

    // First frame must be a JOIN
    let first_msg = match ws_receiver.next().await {
        Some(Ok(WsMessage::Binary(data))) => data.to_vec(),
        _ => return,
    };
    if !matches!(decode_message_type(&first_msg), Ok(MessageType::Join)) {
        tracing::debug!("Connection opened without JOIN, closing");
        return;
    }
    let join = match decode_payload::<JoinMsg>(&first_msg) {
        Ok(j) => j,
        Err(e) => {
            tracing::debug!(error = %e, "Malformed JOIN, closing");
            return;
        },
    };

    let (tx, rx) = mpsc::unbounded_channel::<Vec<u8>>();
    let joined = {
        let mut relay = state.relay.write().await;
        relay.join(&join.room, &join.identity, tx)
    };
    if let Err(e) = joined {
        tracing::warn!(room = %join.room, peer = %join.identity, error = %e, "Join rejected");
        let reject = Message::JoinRejected(JoinRejectedMsg {
            reason: e.to_string(),
        });
        if let Ok(data) = encode_message(&reject) {
            let _ = ws_sender.send(WsMessage::Binary(data.into())).await;
        }
        let _ = ws_sender.close().await;
        return;
    }

    tracing::info!(room = %join.room, peer = %join.identity, "Peer joined");
    spawn_relay_writer(ws_sender, rx);

    member_read_loop(&mut ws_receiver, &state, &join.room, &join.identity).await;

    let mut relay = state.relay.write().await;
    if let Some(ended) = relay.leave(&join.room, &join.identity) {
        tracing::info!(room = %join.room, reason = %ended.reason, "Game settled on departure");
    }
    tracing::info!(room = %join.room, peer = %join.identity, "Peer left");
}

fn spawn_relay_writer(
    mut ws_sender: SplitSink<WebSocket, WsMessage>,
    mut rx: mpsc::UnboundedReceiver<Vec<u8>>,
) {
    tokio::spawn(async move {
        while let Some(data) = rx.recv().await {
            if ws_sender.send(WsMessage::Binary(data.into())).await.is_err() {
                break;
            }
        }
    });
}

/// Per-connection rate limiter (token bucket).
struct RateLimiter {
    tokens: f64,
    last_refill: tokio::time::Instant,
    max_tokens: f64,
    refill_rate: f64,
}

impl RateLimiter {
    fn new(max_tokens: f64, refill_rate: f64) -> Self {
        Self {
            tokens: max_tokens,
            last_refill: tokio::time::Instant::now(),
            max_tokens,
            refill_rate,
        }
    }

    fn allow(&mut self) -> bool {
        let now = tokio::time::Instant::now();
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.refill_rate).min(self.max_tokens);
        self.last_refill = now;
        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

/// Member read loop: gossip goes to the other members, votes to the tally.
/// Returns on LEAVE, close, or socket error.
async fn member_read_loop(
    ws_receiver: &mut SplitStream<WebSocket>,
    state: &AppState,
    room: &str,
    identity: &str,
) {
    let mut rate_limiter =
        RateLimiter::new(state.config.rate_limit_burst, state.config.rate_limit_per_sec);

    while let Some(Ok(msg)) = ws_receiver.next().await {
        let data = match msg {
            WsMessage::Binary(d) => d.to_vec(),
            WsMessage::Close(_) => break,
            _ => continue,
        };

        if data.is_empty() {
            continue;
        }

        if data.len() > MAX_MESSAGE_SIZE {
            tracing::warn!(room, peer = identity, size = data.len(), "Oversized frame dropped");
            continue;
        }

        if !rate_limiter.allow() {
            tracing::warn!(room, peer = identity, "Peer rate limited");
            continue;
        }

        let msg_type = match decode_message_type(&data) {
            Ok(t) => t,
            Err(e) => {
                tracing::debug!(room, peer = identity, error = %e, "Undecodable frame dropped");
                continue;
            },
        };

        match msg_type.route() {
            Route::Gossip => {
                tracing::debug!(room, peer = identity, ?msg_type, "Relaying gossip");
                let relay = state.relay.read().await;
                relay.relay_gossip(room, identity, &data);
            },
            Route::ToRelay => match msg_type {
                MessageType::Leave => break,
                MessageType::GameEndVote => {
                    let mut vote = match decode_payload::<GameEndVoteMsg>(&data) {
                        Ok(v) => v,
                        Err(e) => {
                            tracing::debug!(room, peer = identity, error = %e, "Malformed vote dropped");
                            continue;
                        },
                    };
                    // A connection only votes for itself
                    vote.identity = identity.to_string();
                    tracing::info!(room, peer = identity, reason = %vote.reason, "Game end vote");
                    let mut relay = state.relay.write().await;
                    if let Some(ended) = relay.record_vote(room, vote) {
                        tracing::info!(
                            room,
                            reason = %ended.reason,
                            winner = ?ended.winner,
                            "Game ended"
                        );
                    }
                },
                _ => {
                    tracing::debug!(room, peer = identity, ?msg_type, "Repeated JOIN ignored");
                },
            },
            Route::FromRelay => {
                tracing::debug!(room, peer = identity, ?msg_type, "Relay-only message from peer dropped");
            },
        }
    }
}
