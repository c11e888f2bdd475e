use serde::Deserialize;

use crate::error::PeerError;

/// Headless peer configuration, loaded from `config/peer.toml`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PeerConfig {
    /// WebSocket URL of the relay's `/relay` route.
    pub relay_url: String,
    pub room: String,
    pub identity: String,
    /// Opaque lobby session token forwarded with the join.
    pub token: String,
    /// Simulation ticks per second.
    pub tick_rate_hz: f32,
}

impl Default for PeerConfig {
    fn default() -> Self {
        Self {
            relay_url: "ws://127.0.0.1:8081/relay".to_string(),
            room: "LOBBY".to_string(),
            identity: "pilot".to_string(),
            token: String::new(),
            tick_rate_hz: 60.0,
        }
    }
}

impl PeerConfig {
    /// Load config from `ROCKFALL_PEER_CONFIG` or `config/peer.toml`, then
    /// apply env var overrides.
    pub fn load() -> Self {
        let path = std::env::var("ROCKFALL_PEER_CONFIG")
            .ok()
            .filter(|p| !p.is_empty())
            .unwrap_or_else(|| "config/peer.toml".to_string());
        let mut config = match std::fs::read_to_string(&path) {
            Ok(content) => match toml::from_str::<PeerConfig>(&content) {
                Ok(cfg) => cfg,
                Err(e) => {
                    tracing::warn!(path = %path, "Failed to parse peer config: {e}, using defaults");
                    PeerConfig::default()
                },
            },
            Err(_) => PeerConfig::default(),
        };

        if let Ok(url) = std::env::var("ROCKFALL_RELAY_URL")
            && !url.is_empty()
        {
            config.relay_url = url;
        }
        if let Ok(token) = std::env::var("ROCKFALL_TOKEN")
            && !token.is_empty()
        {
            config.token = token;
        }

        config
    }

    /// Apply `--relay=`, `--room=`, `--name=` and `--token=` overrides.
    pub fn apply_args<I: IntoIterator<Item = String>>(&mut self, args: I) {
        for arg in args {
            if let Some(url) = arg.strip_prefix("--relay=") {
                self.relay_url = url.to_string();
            } else if let Some(room) = arg.strip_prefix("--room=") {
                self.room = room.to_string();
            } else if let Some(name) = arg.strip_prefix("--name=") {
                self.identity = name.to_string();
            } else if let Some(token) = arg.strip_prefix("--token=") {
                self.token = token.to_string();
            } else {
                tracing::warn!(arg = %arg, "Ignoring unknown argument");
            }
        }
    }

    pub fn validate(&self) -> Result<(), PeerError> {
        if !self.relay_url.starts_with("ws://") && !self.relay_url.starts_with("wss://") {
            return Err(PeerError::Config(format!(
                "relay_url must be a ws:// or wss:// URL: {}",
                self.relay_url
            )));
        }
        if self.tick_rate_hz.is_nan() || self.tick_rate_hz <= 0.0 {
            return Err(PeerError::Config("tick_rate_hz must be > 0".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let cfg = PeerConfig::default();
        assert_eq!(cfg.room, "LOBBY");
        assert_eq!(cfg.tick_rate_hz, 60.0);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn args_override_fields() {
        let mut cfg = PeerConfig::default();
        cfg.apply_args(
            [
                "--relay=ws://10.0.0.2:9000/relay",
                "--room=ARENA",
                "--name=alice",
                "--token=abc",
                "--verbose",
            ]
            .map(String::from),
        );
        assert_eq!(cfg.relay_url, "ws://10.0.0.2:9000/relay");
        assert_eq!(cfg.room, "ARENA");
        assert_eq!(cfg.identity, "alice");
        assert_eq!(cfg.token, "abc");
    }

    #[test]
    fn parse_partial_toml() {
        let cfg: PeerConfig = toml::from_str(
            r#"
identity = "bob"
tick_rate_hz = 30.0
"#,
        )
        .unwrap();
        assert_eq!(cfg.identity, "bob");
        assert_eq!(cfg.tick_rate_hz, 30.0);
        assert_eq!(cfg.room, "LOBBY");
    }

    #[test]
    fn validate_rejects_bad_values() {
        let http = PeerConfig {
            relay_url: "http://localhost/relay".into(),
            ..PeerConfig::default()
        };
        assert!(http.validate().is_err());

        let frozen = PeerConfig {
            tick_rate_hz: 0.0,
            ..PeerConfig::default()
        };
        assert!(frozen.validate().is_err());
    }
}
