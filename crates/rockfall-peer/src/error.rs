use std::fmt;

use rockfall_core::net::protocol::ProtocolError;

#[derive(Debug)]
pub enum PeerError {
    /// Could not open the WebSocket to the relay.
    Connect(String),
    /// The socket failed while sending the join.
    Transport(String),
    Protocol(ProtocolError),
    Config(String),
}

impl fmt::Display for PeerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connect(m) => write!(f, "connect failed: {m}"),
            Self::Transport(m) => write!(f, "transport error: {m}"),
            Self::Protocol(e) => write!(f, "protocol error: {e}"),
            Self::Config(m) => write!(f, "config error: {m}"),
        }
    }
}

impl std::error::Error for PeerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Protocol(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ProtocolError> for PeerError {
    fn from(e: ProtocolError) -> Self {
        Self::Protocol(e)
    }
}
