use tracing_subscriber::EnvFilter;

use rockfall_relay::build_app;
use rockfall_relay::config::RelayConfig;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let mut config = RelayConfig::load();
    config.apply_args(std::env::args().skip(1));
    if let Err(e) = config.validate() {
        tracing::error!(error = %e, "Invalid relay configuration");
        std::process::exit(1);
    }

    let addr = config.listen_addr.clone();
    let max_rooms = config.max_rooms;
    let (app, _state) = build_app(config);

    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(l) => l,
        Err(e) => {
            tracing::error!(addr = %addr, error = %e, "Failed to bind relay");
            std::process::exit(1);
        },
    };

    tracing::info!("Rockfall relay listening on {addr} (max rooms: {max_rooms})");

    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!(error = %e, "Relay server error");
        std::process::exit(1);
    }
}
