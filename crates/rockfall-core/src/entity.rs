use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::SessionConfig;

/// Identity of a peer (its username in the room).
pub type PeerId = String;

/// Globally unique entity identifier: the owning peer plus a counter that
/// peer never reuses. Sequence 0 is reserved for the peer's avatar.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId {
    pub owner: PeerId,
    pub seq: u64,
}

impl EntityId {
    pub const AVATAR_SEQ: u64 = 0;

    pub fn new(owner: impl Into<PeerId>, seq: u64) -> Self {
        Self {
            owner: owner.into(),
            seq,
        }
    }

    pub fn avatar(owner: impl Into<PeerId>) -> Self {
        Self::new(owner, Self::AVATAR_SEQ)
    }

    pub fn is_avatar(&self) -> bool {
        self.seq == Self::AVATAR_SEQ
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.owner, self.seq)
    }
}

/// Entity category, used by the authority table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    Avatar,
    Obstacle,
    Projectile,
}

/// Obstacle size class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SizeClass {
    Small,
    Large,
}

impl SizeClass {
    pub fn radius(self, config: &SessionConfig) -> f32 {
        match self {
            Self::Small => config.small_radius,
            Self::Large => config.large_radius,
        }
    }

    pub fn hit_points(self, config: &SessionConfig) -> i32 {
        match self {
            Self::Small => config.small_hp,
            Self::Large => config.large_hp,
        }
    }

    /// Score awarded for destroying an obstacle of this class.
    pub fn reward(self, config: &SessionConfig) -> u32 {
        match self {
            Self::Small => config.small_reward,
            Self::Large => config.large_reward,
        }
    }
}

/// A player's ship. Only the represented peer mutates hp, score and alive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Avatar {
    pub identity: PeerId,
    pub x: f32,
    pub y: f32,
    pub vx: f32,
    pub vy: f32,
    pub hp: i32,
    pub score: u32,
    pub alive: bool,
    /// Session clock (seconds) of the last shot.
    pub last_fire: Option<f64>,
    /// False once the relay reported the peer as gone.
    pub connected: bool,
}

impl Avatar {
    pub fn new(identity: impl Into<PeerId>, config: &SessionConfig) -> Self {
        Self {
            identity: identity.into(),
            x: config.avatar_start_x,
            y: config.avatar_start_y,
            vx: 0.0,
            vy: 0.0,
            hp: config.avatar_max_hp,
            score: 0,
            alive: true,
            last_fire: None,
            connected: true,
        }
    }

    pub fn id(&self) -> EntityId {
        EntityId::avatar(self.identity.clone())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Projectile {
    pub id: EntityId,
    /// Identity of the avatar that fired it.
    pub owner: PeerId,
    pub x: f32,
    pub y: f32,
    pub vy: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Obstacle {
    pub id: EntityId,
    pub x: f32,
    pub y: f32,
    pub vy: f32,
    pub radius: f32,
    pub hp: i32,
    pub size: SizeClass,
}

impl Obstacle {
    pub fn owner(&self) -> &str {
        &self.id.owner
    }
}
