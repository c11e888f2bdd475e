use serde::Deserialize;

use crate::error::RelayError;

/// Relay configuration, loaded from `config/relay.toml`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    pub listen_addr: String,
    pub max_rooms: usize,
    pub max_members_per_room: usize,
    /// Per-connection token bucket: max burst of frames.
    pub rate_limit_burst: f64,
    /// Per-connection token bucket: frames refilled per second.
    pub rate_limit_per_sec: f64,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8081".to_string(),
            max_rooms: 100,
            max_members_per_room: 8,
            rate_limit_burst: 400.0,
            rate_limit_per_sec: 400.0,
        }
    }
}

impl RelayConfig {
    /// Load config from `ROCKFALL_RELAY_CONFIG` or `config/relay.toml`, then
    /// apply env var overrides.
    pub fn load() -> Self {
        let path = std::env::var("ROCKFALL_RELAY_CONFIG")
            .ok()
            .filter(|p| !p.is_empty())
            .unwrap_or_else(|| "config/relay.toml".to_string());
        let mut config = match std::fs::read_to_string(&path) {
            Ok(content) => match toml::from_str::<RelayConfig>(&content) {
                Ok(cfg) => {
                    tracing::info!(path = %path, "Loaded relay configuration");
                    cfg
                },
                Err(e) => {
                    tracing::warn!(path = %path, "Failed to parse relay config: {e}, using defaults");
                    RelayConfig::default()
                },
            },
            Err(_) => {
                tracing::info!(path = %path, "No relay config found, using defaults");
                RelayConfig::default()
            },
        };

        if let Ok(addr) = std::env::var("ROCKFALL_RELAY_LISTEN_ADDR")
            && !addr.is_empty()
        {
            config.listen_addr = addr;
        }
        if let Ok(val) = std::env::var("ROCKFALL_RELAY_MAX_ROOMS")
            && let Ok(n) = val.parse::<usize>()
        {
            config.max_rooms = n;
        }

        config
    }

    /// Apply `--port=N` and `--max-rooms=N` command-line overrides.
    pub fn apply_args<I: IntoIterator<Item = String>>(&mut self, args: I) {
        for arg in args {
            if let Some(port) = arg.strip_prefix("--port=")
                && let Ok(port) = port.parse::<u16>()
            {
                let host = self
                    .listen_addr
                    .rsplit_once(':')
                    .map_or("0.0.0.0", |(host, _)| host);
                self.listen_addr = format!("{host}:{port}");
            } else if let Some(n) = arg.strip_prefix("--max-rooms=")
                && let Ok(n) = n.parse::<usize>()
            {
                self.max_rooms = n;
            }
        }
    }

    pub fn validate(&self) -> Result<(), RelayError> {
        if self.listen_addr.parse::<std::net::SocketAddr>().is_err() {
            return Err(RelayError::Config(format!(
                "listen_addr is not a valid socket address: {}",
                self.listen_addr
            )));
        }
        if self.max_rooms == 0 {
            return Err(RelayError::Config("max_rooms must be > 0".into()));
        }
        if self.max_members_per_room == 0 {
            return Err(RelayError::Config("max_members_per_room must be > 0".into()));
        }
        if self.rate_limit_burst < 1.0 || self.rate_limit_per_sec <= 0.0 {
            return Err(RelayError::Config(
                "rate limit must allow at least one frame".into(),
            ));
        }
        Ok(())
    }
}
