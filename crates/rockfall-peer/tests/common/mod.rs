use std::net::SocketAddr;
use std::time::Duration;

use rockfall_peer::PeerConfig;
use rockfall_relay::config::RelayConfig;
use rockfall_relay::{AppState, build_app};

pub struct TestRelay {
    pub addr: SocketAddr,
    pub state: AppState,
    _shutdown: tokio::task::JoinHandle<()>,
}

impl TestRelay {
    pub async fn new() -> Self {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let (app, state) = build_app(RelayConfig::default());
        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        // Give the relay a moment to start accepting
        tokio::time::sleep(Duration::from_millis(20)).await;

        Self {
            addr,
            state,
            _shutdown: handle,
        }
    }

    pub fn peer_config(&self, room: &str, identity: &str) -> PeerConfig {
        PeerConfig {
            relay_url: format!("ws://{}/relay", self.addr),
            room: room.to_string(),
            identity: identity.to_string(),
            ..PeerConfig::default()
        }
    }
}
