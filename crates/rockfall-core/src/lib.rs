pub mod apply;
pub mod authority;
pub mod collision;
pub mod config;
pub mod entity;
pub mod mirror;
pub mod net;
pub mod ownership;
pub mod session;
pub mod sim;
pub mod termination;
pub mod time;
pub mod world;

pub use config::{SessionConfig, WinMode};
pub use session::PeerSession;
pub use sim::AvatarInput;

#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers {
    use crate::config::SessionConfig;
    use crate::net::messages::{JoinedMsg, Message};
    use crate::session::PeerSession;
    use crate::sim::AvatarInput;

    /// Defaults with spawning disabled and a fixed seed, so tests place
    /// every obstacle themselves.
    pub fn quiet_config() -> SessionConfig {
        SessionConfig {
            spawn_interval: f32::MAX,
            seed: Some(42),
            ..SessionConfig::default()
        }
    }

    /// A session that has already received its `Joined` acknowledgment.
    /// Messages produced by the join tick are discarded.
    pub fn joined_session(identity: &str, roster: &[&str], config: SessionConfig) -> PeerSession {
        let mut session = PeerSession::new(identity, config);
        session.enqueue(Message::Joined(JoinedMsg {
            room: "TEST".to_string(),
            identity: identity.to_string(),
            roster: roster.iter().map(|s| s.to_string()).collect(),
            elapsed_ms: 0,
        }));
        session.tick(0.0, &AvatarInput::default());
        session
    }
}
