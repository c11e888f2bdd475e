//! Who may declare what.
//!
//! Each (entity kind, action) pair maps to the set of peers allowed to
//! declare it. Most actions belong to the entity's owner; the two
//! exceptions are projectile damage (declared by the attacker, whoever owns
//! the target) and avatar impact (declared by the peer whose avatar hit the
//! obstacle, since only it can lower that avatar's hit points).

use serde::{Deserialize, Serialize};

use crate::entity::EntityKind;

/// Why an entity left the world.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DestroyReason {
    /// Hit by a projectile (obstacle depleted, or projectile consumed).
    Bullet,
    OutOfBounds,
    AvatarImpact,
}

/// A state change an event can declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Create,
    Move,
    Damage,
    Destroy(DestroyReason),
    HitPoints,
    Eliminate,
    Score,
}

/// Role a peer must hold relative to the entity to declare an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Declarer {
    /// The peer that created the entity.
    Owner,
    /// The owner of the projectile dealing damage.
    Attacker,
    /// The peer whose avatar touched the entity.
    Collider,
}

use Action::*;
use Declarer::*;
use DestroyReason::*;

/// The full rule table. Pairs not listed may not be declared by anyone.
pub const RULES: &[(EntityKind, Action, &[Declarer])] = &[
    (EntityKind::Avatar, Create, &[Owner]),
    (EntityKind::Avatar, Move, &[Owner]),
    (EntityKind::Avatar, HitPoints, &[Owner]),
    (EntityKind::Avatar, Eliminate, &[Owner]),
    (EntityKind::Avatar, Score, &[Owner]),
    (EntityKind::Obstacle, Create, &[Owner]),
    (EntityKind::Obstacle, Move, &[Owner]),
    (EntityKind::Obstacle, Damage, &[Attacker]),
    (EntityKind::Obstacle, Destroy(Bullet), &[Attacker, Owner]),
    (EntityKind::Obstacle, Destroy(OutOfBounds), &[Owner]),
    (EntityKind::Obstacle, Destroy(AvatarImpact), &[Collider]),
    (EntityKind::Projectile, Create, &[Owner]),
    (EntityKind::Projectile, Move, &[Owner]),
    (EntityKind::Projectile, Destroy(Bullet), &[Owner]),
    (EntityKind::Projectile, Destroy(OutOfBounds), &[Owner]),
];

/// Roles that may declare `action` on an entity of `kind`.
pub fn declarers(kind: EntityKind, action: Action) -> &'static [Declarer] {
    RULES
        .iter()
        .find(|(k, a, _)| *k == kind && *a == action)
        .map(|(_, _, d)| *d)
        .unwrap_or(&[])
}

/// The parties involved in a declaration.
#[derive(Debug, Clone, Copy)]
pub struct Parties<'a> {
    pub owner: &'a str,
    pub attacker: Option<&'a str>,
    pub collider: Option<&'a str>,
}

impl<'a> Parties<'a> {
    pub fn owned_by(owner: &'a str) -> Self {
        Self {
            owner,
            attacker: None,
            collider: None,
        }
    }
}

/// Whether `peer` may declare `action` on an entity of `kind`.
pub fn permits(kind: EntityKind, action: Action, peer: &str, parties: Parties<'_>) -> bool {
    declarers(kind, action).iter().any(|role| match role {
        Owner => parties.owner == peer,
        Attacker => parties.attacker == Some(peer),
        Collider => parties.collider == Some(peer),
    })
}
