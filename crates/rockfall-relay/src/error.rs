use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayError {
    /// JOIN with an empty room id or identity.
    InvalidJoin(String),
    /// Another live connection already uses this identity in the room.
    DuplicateIdentity(String),
    RoomLimitReached,
    RoomFull(String),
    /// A config value that cannot be served.
    Config(String),
}

impl fmt::Display for RelayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidJoin(m) => write!(f, "invalid join: {m}"),
            Self::DuplicateIdentity(id) => write!(f, "identity already in room: {id}"),
            Self::RoomLimitReached => write!(f, "maximum room limit reached"),
            Self::RoomFull(room) => write!(f, "room is full: {room}"),
            Self::Config(m) => write!(f, "config error: {m}"),
        }
    }
}

impl std::error::Error for RelayError {}
