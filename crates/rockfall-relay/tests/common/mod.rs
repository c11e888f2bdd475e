use std::net::SocketAddr;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use rockfall_core::net::messages::{JoinMsg, JoinedMsg, Message};
use rockfall_core::net::protocol::{decode_message, encode_message};

use rockfall_relay::build_app;
use rockfall_relay::config::RelayConfig;

pub type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub struct TestServer {
    pub addr: SocketAddr,
    _shutdown: tokio::task::JoinHandle<()>,
}

impl TestServer {
    pub async fn new() -> Self {
        Self::from_config(RelayConfig::default()).await
    }

    pub async fn from_config(config: RelayConfig) -> Self {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let (app, _state) = build_app(config);
        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        // Give the server a moment to start accepting
        tokio::time::sleep(Duration::from_millis(20)).await;

        Self {
            addr,
            _shutdown: handle,
        }
    }

    pub fn ws_url(&self) -> String {
        format!("ws://{}/relay", self.addr)
    }
}

pub async fn ws_connect(url: &str) -> WsStream {
    let (stream, _) = tokio_tungstenite::connect_async(url).await.unwrap();
    stream
}

pub async fn ws_send_raw(stream: &mut WsStream, data: Vec<u8>) {
    stream.send(WsMessage::Binary(data.into())).await.unwrap();
}

pub async fn ws_send_msg(stream: &mut WsStream, msg: &Message) {
    ws_send_raw(stream, encode_message(msg).unwrap()).await;
}

/// Read raw binary data from a WebSocket stream (5s timeout).
pub async fn ws_read_raw(stream: &mut WsStream) -> Vec<u8> {
    let deadline = Duration::from_secs(5);
    tokio::time::timeout(deadline, async {
        loop {
            match stream.next().await {
                Some(Ok(WsMessage::Binary(data))) => return data.to_vec(),
                Some(Ok(WsMessage::Close(_))) => panic!("WebSocket closed unexpectedly"),
                Some(Err(e)) => panic!("WebSocket error: {e}"),
                None => panic!("WebSocket stream ended"),
                _ => continue,
            }
        }
    })
    .await
    .expect("Timed out waiting for WebSocket message")
}

/// Try to read raw binary data, returning None on timeout or close.
pub async fn ws_try_read_raw(stream: &mut WsStream, timeout_ms: u64) -> Option<Vec<u8>> {
    let deadline = Duration::from_millis(timeout_ms);
    tokio::time::timeout(deadline, async {
        loop {
            match stream.next().await {
                Some(Ok(WsMessage::Binary(data))) => return Some(data.to_vec()),
                Some(Ok(WsMessage::Close(_))) | Some(Err(_)) | None => return None,
                _ => continue,
            }
        }
    })
    .await
    .ok()
    .flatten()
}

pub async fn ws_read_msg(stream: &mut WsStream) -> Message {
    decode_message(&ws_read_raw(stream).await).unwrap()
}

pub fn join_msg(room: &str, identity: &str) -> Message {
    Message::Join(JoinMsg {
        room: room.to_string(),
        identity: identity.to_string(),
        token: "test-token".to_string(),
    })
}

/// Connect and join, returning the stream and its `Joined` acknowledgment.
pub async fn ws_join(server: &TestServer, room: &str, identity: &str) -> (WsStream, JoinedMsg) {
    let mut stream = ws_connect(&server.ws_url()).await;
    ws_send_msg(&mut stream, &join_msg(room, identity)).await;
    match ws_read_msg(&mut stream).await {
        Message::Joined(joined) => (stream, joined),
        other => panic!("Expected Joined, got: {other:?}"),
    }
}
