use serde::{Deserialize, Serialize};

use crate::authority::DestroyReason;
use crate::entity::{Avatar, EntityId, Obstacle, PeerId, Projectile, SizeClass};
use crate::termination::EndReason;

/// Network message type discriminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum MessageType {
    // Peer -> Relay
    Join = 0x01,
    Leave = 0x02,
    GameEndVote = 0x03,

    // Relay -> Peer
    Joined = 0x10,
    JoinRejected = 0x11,
    PlayerJoined = 0x12,
    PlayerLeft = 0x13,
    GameEnded = 0x14,

    // Peer -> Peers (forwarded by the relay)
    AvatarPosition = 0x20,
    ObstacleSpawn = 0x21,
    ObstaclePosition = 0x22,
    ProjectileFired = 0x23,
    ProjectilePosition = 0x24,
    ProjectileHitObstacle = 0x25,
    AvatarHit = 0x26,
    AvatarEliminated = 0x27,
    ScoreUpdate = 0x28,
    ObstacleDestroyed = 0x29,
    ProjectileDestroyed = 0x2A,
    StateRequest = 0x2B,
    StateSnapshot = 0x2C,
}

/// Where a message type travels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Consumed by the relay.
    ToRelay,
    /// Originated by the relay.
    FromRelay,
    /// Forwarded by the relay to every other room member.
    Gossip,
}

impl MessageType {
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            0x01 => Some(Self::Join),
            0x02 => Some(Self::Leave),
            0x03 => Some(Self::GameEndVote),
            0x10 => Some(Self::Joined),
            0x11 => Some(Self::JoinRejected),
            0x12 => Some(Self::PlayerJoined),
            0x13 => Some(Self::PlayerLeft),
            0x14 => Some(Self::GameEnded),
            0x20 => Some(Self::AvatarPosition),
            0x21 => Some(Self::ObstacleSpawn),
            0x22 => Some(Self::ObstaclePosition),
            0x23 => Some(Self::ProjectileFired),
            0x24 => Some(Self::ProjectilePosition),
            0x25 => Some(Self::ProjectileHitObstacle),
            0x26 => Some(Self::AvatarHit),
            0x27 => Some(Self::AvatarEliminated),
            0x28 => Some(Self::ScoreUpdate),
            0x29 => Some(Self::ObstacleDestroyed),
            0x2A => Some(Self::ProjectileDestroyed),
            0x2B => Some(Self::StateRequest),
            0x2C => Some(Self::StateSnapshot),
            _ => None,
        }
    }

    pub fn route(self) -> Route {
        match self as u8 {
            0x01..=0x0F => Route::ToRelay,
            0x10..=0x1F => Route::FromRelay,
            _ => Route::Gossip,
        }
    }
}

// ---------------------------------------------------------------------------
// Peer -> Relay
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JoinMsg {
    pub room: String,
    pub identity: PeerId,
    /// Opaque session token; validated by the lobby before the relay sees it.
    pub token: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaveMsg {}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameEndVoteMsg {
    pub identity: PeerId,
    pub reason: EndReason,
    pub score: u32,
    pub hp: i32,
    pub alive: bool,
    /// Unix epoch milliseconds at the time of voting.
    pub timestamp_ms: u64,
}

// ---------------------------------------------------------------------------
// Relay -> Peer
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JoinedMsg {
    pub room: String,
    pub identity: PeerId,
    pub roster: Vec<PeerId>,
    /// Milliseconds since the room's first join.
    pub elapsed_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JoinRejectedMsg {
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerJoinedMsg {
    pub identity: PeerId,
    pub roster: Vec<PeerId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerLeftMsg {
    pub identity: PeerId,
    pub roster: Vec<PeerId>,
}

/// One member's result as settled by the relay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalStanding {
    pub identity: PeerId,
    pub score: u32,
    pub hp: i32,
    pub alive: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameEndedMsg {
    pub reason: EndReason,
    /// Sorted by score, highest first.
    pub standings: Vec<FinalStanding>,
    pub winner: Option<PeerId>,
}

// ---------------------------------------------------------------------------
// Gossip
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AvatarPositionMsg {
    pub identity: PeerId,
    pub x: f32,
    pub y: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObstacleSpawnMsg {
    pub id: EntityId,
    pub owner: PeerId,
    pub x: f32,
    pub y: f32,
    pub vy: f32,
    pub radius: f32,
    pub hp: i32,
    pub size: SizeClass,
}

impl ObstacleSpawnMsg {
    pub fn from_obstacle(obstacle: &Obstacle) -> Self {
        Self {
            id: obstacle.id.clone(),
            owner: obstacle.owner().to_string(),
            x: obstacle.x,
            y: obstacle.y,
            vy: obstacle.vy,
            radius: obstacle.radius,
            hp: obstacle.hp,
            size: obstacle.size,
        }
    }

    pub fn into_obstacle(self) -> Obstacle {
        Obstacle {
            id: self.id,
            x: self.x,
            y: self.y,
            vy: self.vy,
            radius: self.radius,
            hp: self.hp,
            size: self.size,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObstaclePositionMsg {
    pub id: EntityId,
    pub x: f32,
    pub y: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectileFiredMsg {
    pub id: EntityId,
    pub owner: PeerId,
    pub x: f32,
    pub y: f32,
    pub vy: f32,
}

impl ProjectileFiredMsg {
    pub fn from_projectile(projectile: &Projectile) -> Self {
        Self {
            id: projectile.id.clone(),
            owner: projectile.owner.clone(),
            x: projectile.x,
            y: projectile.y,
            vy: projectile.vy,
        }
    }

    pub fn into_projectile(self) -> Projectile {
        Projectile {
            id: self.id,
            owner: self.owner,
            x: self.x,
            y: self.y,
            vy: self.vy,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectilePositionMsg {
    pub id: EntityId,
    pub x: f32,
    pub y: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectileHitObstacleMsg {
    pub obstacle_id: EntityId,
    pub projectile_id: EntityId,
    pub attacker: PeerId,
    pub obstacle_owner: PeerId,
    pub destroyed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AvatarHitMsg {
    pub identity: PeerId,
    pub obstacle_id: EntityId,
    /// Hit points remaining after the impact.
    pub hp: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AvatarEliminatedMsg {
    pub identity: PeerId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScoreReason {
    ObstacleDestroyed(SizeClass),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreUpdateMsg {
    pub identity: PeerId,
    /// Absolute score, not a delta.
    pub score: u32,
    pub reason: ScoreReason,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObstacleDestroyedMsg {
    pub id: EntityId,
    pub reason: DestroyReason,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectileDestroyedMsg {
    pub id: EntityId,
    pub reason: DestroyReason,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateRequestMsg {
    pub identity: PeerId,
}

/// Everything one peer owns, sent in reply to a `StateRequest`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateSnapshotMsg {
    pub identity: PeerId,
    pub avatar: Avatar,
    pub obstacles: Vec<Obstacle>,
    pub projectiles: Vec<Projectile>,
}

/// The full message catalog.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Join(JoinMsg),
    Leave(LeaveMsg),
    GameEndVote(GameEndVoteMsg),
    Joined(JoinedMsg),
    JoinRejected(JoinRejectedMsg),
    PlayerJoined(PlayerJoinedMsg),
    PlayerLeft(PlayerLeftMsg),
    GameEnded(GameEndedMsg),
    AvatarPosition(AvatarPositionMsg),
    ObstacleSpawn(ObstacleSpawnMsg),
    ObstaclePosition(ObstaclePositionMsg),
    ProjectileFired(ProjectileFiredMsg),
    ProjectilePosition(ProjectilePositionMsg),
    ProjectileHitObstacle(ProjectileHitObstacleMsg),
    AvatarHit(AvatarHitMsg),
    AvatarEliminated(AvatarEliminatedMsg),
    ScoreUpdate(ScoreUpdateMsg),
    ObstacleDestroyed(ObstacleDestroyedMsg),
    ProjectileDestroyed(ProjectileDestroyedMsg),
    StateRequest(StateRequestMsg),
    StateSnapshot(Box<StateSnapshotMsg>),
}

impl Message {
    pub fn message_type(&self) -> MessageType {
        match self {
            Self::Join(_) => MessageType::Join,
            Self::Leave(_) => MessageType::Leave,
            Self::GameEndVote(_) => MessageType::GameEndVote,
            Self::Joined(_) => MessageType::Joined,
            Self::JoinRejected(_) => MessageType::JoinRejected,
            Self::PlayerJoined(_) => MessageType::PlayerJoined,
            Self::PlayerLeft(_) => MessageType::PlayerLeft,
            Self::GameEnded(_) => MessageType::GameEnded,
            Self::AvatarPosition(_) => MessageType::AvatarPosition,
            Self::ObstacleSpawn(_) => MessageType::ObstacleSpawn,
            Self::ObstaclePosition(_) => MessageType::ObstaclePosition,
            Self::ProjectileFired(_) => MessageType::ProjectileFired,
            Self::ProjectilePosition(_) => MessageType::ProjectilePosition,
            Self::ProjectileHitObstacle(_) => MessageType::ProjectileHitObstacle,
            Self::AvatarHit(_) => MessageType::AvatarHit,
            Self::AvatarEliminated(_) => MessageType::AvatarEliminated,
            Self::ScoreUpdate(_) => MessageType::ScoreUpdate,
            Self::ObstacleDestroyed(_) => MessageType::ObstacleDestroyed,
            Self::ProjectileDestroyed(_) => MessageType::ProjectileDestroyed,
            Self::StateRequest(_) => MessageType::StateRequest,
            Self::StateSnapshot(_) => MessageType::StateSnapshot,
        }
    }

    pub fn route(&self) -> Route {
        self.message_type().route()
    }
}
