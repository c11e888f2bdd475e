use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::config::SessionConfig;
use crate::entity::{Avatar, EntityId, Obstacle, PeerId, Projectile};
use crate::ownership::OwnershipRegistry;
use crate::termination::Phase;

/// The merged world view of one peer: owned entities plus mirrors.
///
/// Removed obstacle and projectile ids are kept as tombstones so that late or
/// duplicated events can never bring them back.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct World {
    pub avatars: BTreeMap<PeerId, Avatar>,
    pub obstacles: BTreeMap<EntityId, Obstacle>,
    pub projectiles: BTreeMap<EntityId, Projectile>,
    retired: HashSet<EntityId>,
    applied_hits: HashSet<EntityId>,
}

impl World {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_retired(&self, id: &EntityId) -> bool {
        self.retired.contains(id)
    }

    /// Whether `id` is a live obstacle or projectile.
    pub fn contains(&self, id: &EntityId) -> bool {
        self.obstacles.contains_key(id) || self.projectiles.contains_key(id)
    }

    /// Remove an obstacle or projectile and tombstone its id.
    ///
    /// Returns `false` if the id was already retired. Unknown ids are
    /// tombstoned too so a spawn arriving after its destroy stays dead.
    pub fn retire(&mut self, id: &EntityId) -> bool {
        if !self.retired.insert(id.clone()) {
            return false;
        }
        self.obstacles.remove(id);
        self.projectiles.remove(id);
        true
    }

    /// Insert an obstacle unless its id is live or retired.
    pub fn insert_obstacle(&mut self, obstacle: Obstacle) -> bool {
        if self.is_retired(&obstacle.id) || self.contains(&obstacle.id) {
            return false;
        }
        self.obstacles.insert(obstacle.id.clone(), obstacle);
        true
    }

    /// Insert a projectile unless its id is live or retired.
    pub fn insert_projectile(&mut self, projectile: Projectile) -> bool {
        if self.is_retired(&projectile.id) || self.contains(&projectile.id) {
            return false;
        }
        self.projectiles.insert(projectile.id.clone(), projectile);
        true
    }

    /// Record that the hit carried by `projectile_id` has been applied.
    /// Returns `false` if it already was.
    pub fn mark_hit_applied(&mut self, projectile_id: &EntityId) -> bool {
        self.applied_hits.insert(projectile_id.clone())
    }

    pub fn avatar(&self, identity: &str) -> Option<&Avatar> {
        self.avatars.get(identity)
    }

    pub fn avatar_mut(&mut self, identity: &str) -> Option<&mut Avatar> {
        self.avatars.get_mut(identity)
    }

    /// Get the avatar for `identity`, creating a fresh one if unknown.
    pub fn ensure_avatar(&mut self, identity: &str, config: &SessionConfig) -> &mut Avatar {
        self.avatars
            .entry(identity.to_string())
            .or_insert_with(|| Avatar::new(identity, config))
    }

    /// Build the render view for the local peer.
    pub fn snapshot(
        &self,
        registry: &OwnershipRegistry,
        phase: Phase,
        elapsed_secs: f64,
    ) -> WorldSnapshot {
        let local = registry.local_peer();
        WorldSnapshot {
            avatars: self
                .avatars
                .values()
                .map(|a| EntityView {
                    owned: a.identity == local,
                    entity: a.clone(),
                })
                .collect(),
            obstacles: self
                .obstacles
                .values()
                .map(|o| EntityView {
                    owned: registry.is_owned(&o.id),
                    entity: o.clone(),
                })
                .collect(),
            projectiles: self
                .projectiles
                .values()
                .map(|p| EntityView {
                    owned: registry.is_owned(&p.id),
                    entity: p.clone(),
                })
                .collect(),
            phase,
            elapsed_secs,
        }
    }
}

/// An entity as handed to the renderer, flagged owned or mirrored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityView<T> {
    pub entity: T,
    pub owned: bool,
}

/// Merged, tick-synchronized view of the arena.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorldSnapshot {
    /// Sorted by identity.
    pub avatars: Vec<EntityView<Avatar>>,
    pub obstacles: Vec<EntityView<Obstacle>>,
    pub projectiles: Vec<EntityView<Projectile>>,
    pub phase: Phase,
    /// Seconds since the room's start acknowledgment, or since the session began.
    pub elapsed_secs: f64,
}
