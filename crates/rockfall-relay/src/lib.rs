pub mod config;
pub mod error;
pub mod relay;
pub mod ws;

use std::sync::Arc;

use axum::Router;
use tokio::sync::RwLock;

use config::RelayConfig;
use relay::{RelayState, SharedRelayState};

/// State shared by every relay connection.
#[derive(Clone)]
pub struct AppState {
    pub relay: SharedRelayState,
    pub config: Arc<RelayConfig>,
}

impl AppState {
    pub fn new(config: RelayConfig) -> Self {
        let relay = RelayState::new(config.max_rooms, config.max_members_per_room);
        Self {
            relay: Arc::new(RwLock::new(relay)),
            config: Arc::new(config),
        }
    }
}

/// Build the Axum router and application state from a config.
pub fn build_app(config: RelayConfig) -> (Router<()>, AppState) {
    let state = AppState::new(config);
    let app = Router::new()
        .route("/relay", axum::routing::get(ws::relay_ws_handler))
        .with_state(state.clone());
    (app, state)
}
