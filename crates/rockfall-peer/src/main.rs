use tracing_subscriber::EnvFilter;

use rockfall_core::SessionConfig;
use rockfall_peer::{Outcome, PeerConfig, run};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let mut config = PeerConfig::load();
    config.apply_args(std::env::args().skip(1));
    if let Err(e) = config.validate() {
        tracing::error!(error = %e, "Invalid peer configuration");
        std::process::exit(1);
    }
    let session_config = SessionConfig::load();
    tracing::info!(
        relay = %config.relay_url,
        room = %config.room,
        peer = %config.identity,
        win_mode = %session_config.win_mode,
        "Rockfall peer starting"
    );

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    match run(&config, session_config, shutdown).await {
        Ok(Outcome::Rejected(reason)) => {
            tracing::error!(reason = %reason, "Relay refused the join");
            std::process::exit(2);
        },
        Ok(_) => {},
        Err(e) => {
            tracing::error!(error = %e, "Peer failed");
            std::process::exit(1);
        },
    }
}
