use serde::{Deserialize, Serialize};

use super::messages::{
    AvatarEliminatedMsg, AvatarHitMsg, AvatarPositionMsg, GameEndVoteMsg, GameEndedMsg, JoinMsg,
    JoinRejectedMsg, JoinedMsg, LeaveMsg, Message, MessageType, ObstacleDestroyedMsg,
    ObstaclePositionMsg, ObstacleSpawnMsg, PlayerJoinedMsg, PlayerLeftMsg, ProjectileDestroyedMsg,
    ProjectileFiredMsg, ProjectileHitObstacleMsg, ProjectilePositionMsg, ScoreUpdateMsg,
    StateRequestMsg, StateSnapshotMsg,
};

/// Maximum message size in bytes, type prefix included.
pub const MAX_MESSAGE_SIZE: usize = 64 * 1024; // 64 KiB

#[derive(Debug)]
pub enum ProtocolError {
    EmptyMessage,
    UnknownMessageType(u8),
    PayloadTooLarge(usize),
    SerializeError(String),
    DeserializeError(String),
}

impl std::fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyMessage => write!(f, "empty message"),
            Self::UnknownMessageType(b) => write!(f, "unknown message type: 0x{b:02x}"),
            Self::PayloadTooLarge(size) => {
                write!(
                    f,
                    "payload too large: {size} bytes (max {MAX_MESSAGE_SIZE})"
                )
            },
            Self::SerializeError(e) => write!(f, "serialize error: {e}"),
            Self::DeserializeError(e) => write!(f, "deserialize error: {e}"),
        }
    }
}

impl std::error::Error for ProtocolError {}

/// Encode a serializable payload with a 1-byte type prefix.
pub fn encode_payload<T: Serialize>(
    msg_type: MessageType,
    payload: &T,
) -> Result<Vec<u8>, ProtocolError> {
    let payload_bytes =
        rmp_serde::to_vec(payload).map_err(|e| ProtocolError::SerializeError(e.to_string()))?;
    let total = 1 + payload_bytes.len();
    if total > MAX_MESSAGE_SIZE {
        return Err(ProtocolError::PayloadTooLarge(total));
    }
    let mut buf = Vec::with_capacity(total);
    buf.push(msg_type as u8);
    buf.extend_from_slice(&payload_bytes);
    Ok(buf)
}

/// Encode a `Message` to wire format.
pub fn encode_message(msg: &Message) -> Result<Vec<u8>, ProtocolError> {
    let t = msg.message_type();
    match msg {
        Message::Join(m) => encode_payload(t, m),
        Message::Leave(m) => encode_payload(t, m),
        Message::GameEndVote(m) => encode_payload(t, m),
        Message::Joined(m) => encode_payload(t, m),
        Message::JoinRejected(m) => encode_payload(t, m),
        Message::PlayerJoined(m) => encode_payload(t, m),
        Message::PlayerLeft(m) => encode_payload(t, m),
        Message::GameEnded(m) => encode_payload(t, m),
        Message::AvatarPosition(m) => encode_payload(t, m),
        Message::ObstacleSpawn(m) => encode_payload(t, m),
        Message::ObstaclePosition(m) => encode_payload(t, m),
        Message::ProjectileFired(m) => encode_payload(t, m),
        Message::ProjectilePosition(m) => encode_payload(t, m),
        Message::ProjectileHitObstacle(m) => encode_payload(t, m),
        Message::AvatarHit(m) => encode_payload(t, m),
        Message::AvatarEliminated(m) => encode_payload(t, m),
        Message::ScoreUpdate(m) => encode_payload(t, m),
        Message::ObstacleDestroyed(m) => encode_payload(t, m),
        Message::ProjectileDestroyed(m) => encode_payload(t, m),
        Message::StateRequest(m) => encode_payload(t, m),
        Message::StateSnapshot(m) => encode_payload(t, m.as_ref()),
    }
}

/// Extract the message type byte from raw wire data.
pub fn decode_message_type(data: &[u8]) -> Result<MessageType, ProtocolError> {
    if data.is_empty() {
        return Err(ProtocolError::EmptyMessage);
    }
    MessageType::from_byte(data[0]).ok_or(ProtocolError::UnknownMessageType(data[0]))
}

/// Decode a MessagePack payload (bytes after the type prefix).
pub fn decode_payload<T: for<'de> Deserialize<'de>>(data: &[u8]) -> Result<T, ProtocolError> {
    if data.is_empty() {
        return Err(ProtocolError::EmptyMessage);
    }
    rmp_serde::from_slice(&data[1..]).map_err(|e| ProtocolError::DeserializeError(e.to_string()))
}

/// Decode raw wire data into a `Message`.
pub fn decode_message(data: &[u8]) -> Result<Message, ProtocolError> {
    let msg = match decode_message_type(data)? {
        MessageType::Join => Message::Join(decode_payload::<JoinMsg>(data)?),
        MessageType::Leave => Message::Leave(decode_payload::<LeaveMsg>(data)?),
        MessageType::GameEndVote => Message::GameEndVote(decode_payload::<GameEndVoteMsg>(data)?),
        MessageType::Joined => Message::Joined(decode_payload::<JoinedMsg>(data)?),
        MessageType::JoinRejected => {
            Message::JoinRejected(decode_payload::<JoinRejectedMsg>(data)?)
        },
        MessageType::PlayerJoined => {
            Message::PlayerJoined(decode_payload::<PlayerJoinedMsg>(data)?)
        },
        MessageType::PlayerLeft => Message::PlayerLeft(decode_payload::<PlayerLeftMsg>(data)?),
        MessageType::GameEnded => Message::GameEnded(decode_payload::<GameEndedMsg>(data)?),
        MessageType::AvatarPosition => {
            Message::AvatarPosition(decode_payload::<AvatarPositionMsg>(data)?)
        },
        MessageType::ObstacleSpawn => {
            Message::ObstacleSpawn(decode_payload::<ObstacleSpawnMsg>(data)?)
        },
        MessageType::ObstaclePosition => {
            Message::ObstaclePosition(decode_payload::<ObstaclePositionMsg>(data)?)
        },
        MessageType::ProjectileFired => {
            Message::ProjectileFired(decode_payload::<ProjectileFiredMsg>(data)?)
        },
        MessageType::ProjectilePosition => {
            Message::ProjectilePosition(decode_payload::<ProjectilePositionMsg>(data)?)
        },
        MessageType::ProjectileHitObstacle => {
            Message::ProjectileHitObstacle(decode_payload::<ProjectileHitObstacleMsg>(data)?)
        },
        MessageType::AvatarHit => Message::AvatarHit(decode_payload::<AvatarHitMsg>(data)?),
        MessageType::AvatarEliminated => {
            Message::AvatarEliminated(decode_payload::<AvatarEliminatedMsg>(data)?)
        },
        MessageType::ScoreUpdate => Message::ScoreUpdate(decode_payload::<ScoreUpdateMsg>(data)?),
        MessageType::ObstacleDestroyed => {
            Message::ObstacleDestroyed(decode_payload::<ObstacleDestroyedMsg>(data)?)
        },
        MessageType::ProjectileDestroyed => {
            Message::ProjectileDestroyed(decode_payload::<ProjectileDestroyedMsg>(data)?)
        },
        MessageType::StateRequest => {
            Message::StateRequest(decode_payload::<StateRequestMsg>(data)?)
        },
        MessageType::StateSnapshot => {
            Message::StateSnapshot(Box::new(decode_payload::<StateSnapshotMsg>(data)?))
        },
    };
    Ok(msg)
}
