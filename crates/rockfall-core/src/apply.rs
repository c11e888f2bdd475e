//! Idempotent application of inbound gossip to the local world view.
//!
//! Rules:
//! - creation events for unknown, non-retired ids create mirrors;
//! - mutation and destruction events for unknown ids are ignored;
//! - position updates never touch owned entities and never create entities;
//! - avatars are only created from the roster, so gossip naming an unknown
//!   identity is ignored;
//! - destroy events retire an id at most once, score only ever rises.

use crate::authority::{self, Action, DestroyReason, Parties};
use crate::config::SessionConfig;
use crate::entity::{Avatar, EntityId, EntityKind};
use crate::net::messages::{
    AvatarHitMsg, Message, ObstacleDestroyedMsg, ProjectileDestroyedMsg, ProjectileHitObstacleMsg,
    StateSnapshotMsg,
};
use crate::ownership::OwnershipRegistry;
use crate::world::World;

/// What applying one inbound message did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// The world changed.
    Applied,
    /// Already applied (or superseded); nothing changed.
    Duplicate,
    /// Not applicable here: unknown id, own entity, own echo, or not gossip.
    Ignored,
}

/// Mutable view of the peer state an inbound message may touch.
pub struct Applier<'a> {
    pub config: &'a SessionConfig,
    pub registry: &'a mut OwnershipRegistry,
    pub world: &'a mut World,
}

impl Applier<'_> {
    fn local(&self) -> &str {
        self.registry.local_peer()
    }

    /// Apply one gossip message. Replies the local peer owes in response
    /// (depletion it must settle, snapshots it was asked for) go to `out`.
    pub fn apply(&mut self, msg: &Message, out: &mut Vec<Message>) -> ApplyOutcome {
        let outcome = match msg {
            Message::AvatarPosition(m) => {
                if m.identity == self.local() {
                    return ApplyOutcome::Ignored;
                }
                match self.world.avatar_mut(&m.identity) {
                    Some(avatar) => {
                        avatar.x = m.x;
                        avatar.y = m.y;
                        ApplyOutcome::Applied
                    },
                    None => ApplyOutcome::Ignored,
                }
            },
            Message::ObstacleSpawn(m) => {
                if self.registry.is_owned(&m.id) {
                    ApplyOutcome::Ignored
                } else if self.world.insert_obstacle(m.clone().into_obstacle()) {
                    ApplyOutcome::Applied
                } else {
                    ApplyOutcome::Duplicate
                }
            },
            Message::ProjectileFired(m) => {
                if self.registry.is_owned(&m.id) {
                    ApplyOutcome::Ignored
                } else if self.world.insert_projectile(m.clone().into_projectile()) {
                    ApplyOutcome::Applied
                } else {
                    ApplyOutcome::Duplicate
                }
            },
            Message::ObstaclePosition(m) => {
                if self.registry.is_owned(&m.id) {
                    return ApplyOutcome::Ignored;
                }
                match self.world.obstacles.get_mut(&m.id) {
                    Some(o) => {
                        o.x = m.x;
                        o.y = m.y;
                        ApplyOutcome::Applied
                    },
                    None => ApplyOutcome::Ignored,
                }
            },
            Message::ProjectilePosition(m) => {
                if self.registry.is_owned(&m.id) {
                    return ApplyOutcome::Ignored;
                }
                match self.world.projectiles.get_mut(&m.id) {
                    Some(p) => {
                        p.x = m.x;
                        p.y = m.y;
                        ApplyOutcome::Applied
                    },
                    None => ApplyOutcome::Ignored,
                }
            },
            Message::ProjectileHitObstacle(m) => self.projectile_hit(m, out),
            Message::AvatarHit(m) => self.avatar_hit(m),
            Message::AvatarEliminated(m) => {
                if m.identity == self.local() {
                    return ApplyOutcome::Ignored;
                }
                match self.world.avatar_mut(&m.identity) {
                    Some(a) if a.alive => {
                        a.alive = false;
                        a.hp = a.hp.min(0);
                        tracing::info!(peer = %m.identity, "Remote avatar eliminated");
                        ApplyOutcome::Applied
                    },
                    Some(_) => ApplyOutcome::Duplicate,
                    None => ApplyOutcome::Ignored,
                }
            },
            Message::ScoreUpdate(m) => {
                if m.identity == self.local() {
                    return ApplyOutcome::Ignored;
                }
                match self.world.avatar_mut(&m.identity) {
                    Some(avatar) if m.score > avatar.score => {
                        avatar.score = m.score;
                        ApplyOutcome::Applied
                    },
                    Some(_) => ApplyOutcome::Duplicate,
                    None => ApplyOutcome::Ignored,
                }
            },
            Message::ObstacleDestroyed(m) => self.obstacle_destroyed(m),
            Message::ProjectileDestroyed(m) => self.projectile_destroyed(m),
            Message::StateRequest(m) => {
                if m.identity == self.local() {
                    return ApplyOutcome::Ignored;
                }
                out.push(Message::StateSnapshot(Box::new(self.owned_state())));
                ApplyOutcome::Applied
            },
            Message::StateSnapshot(m) => self.merge_snapshot(m),
            _ => ApplyOutcome::Ignored,
        };
        if outcome != ApplyOutcome::Applied {
            tracing::debug!(
                msg_type = ?msg.message_type(),
                ?outcome,
                "Inbound event had no effect"
            );
        }
        outcome
    }

    /// Retire `id` if it is not already retired, dropping ownership if held.
    fn destroy(&mut self, id: &EntityId) -> ApplyOutcome {
        if !self.world.retire(id) {
            return ApplyOutcome::Duplicate;
        }
        self.registry.release(id);
        ApplyOutcome::Applied
    }

    fn obstacle_destroyed(&mut self, m: &ObstacleDestroyedMsg) -> ApplyOutcome {
        if m.reason == DestroyReason::OutOfBounds && self.registry.is_owned(&m.id) {
            // Only we may declare our own obstacle out of bounds.
            return ApplyOutcome::Ignored;
        }
        self.destroy(&m.id)
    }

    fn projectile_destroyed(&mut self, m: &ProjectileDestroyedMsg) -> ApplyOutcome {
        // Inbound claims come from other peers, so one on our own projectile
        // was not made by its owner.
        if self.registry.is_owned(&m.id)
            || !authority::permits(
                EntityKind::Projectile,
                Action::Destroy(m.reason),
                &m.id.owner,
                Parties::owned_by(&m.id.owner),
            )
        {
            return ApplyOutcome::Ignored;
        }
        self.destroy(&m.id)
    }

    fn projectile_hit(
        &mut self,
        m: &ProjectileHitObstacleMsg,
        out: &mut Vec<Message>,
    ) -> ApplyOutcome {
        let parties = Parties {
            owner: &m.obstacle_owner,
            attacker: Some(&m.projectile_id.owner),
            collider: None,
        };
        if m.attacker == self.local()
            || !authority::permits(EntityKind::Obstacle, Action::Damage, &m.attacker, parties)
        {
            return ApplyOutcome::Ignored;
        }
        if !self.world.mark_hit_applied(&m.projectile_id) {
            return ApplyOutcome::Duplicate;
        }
        self.world.retire(&m.projectile_id);

        if m.destroyed {
            self.destroy(&m.obstacle_id);
            return ApplyOutcome::Applied;
        }
        let Some(obstacle) = self.world.obstacles.get_mut(&m.obstacle_id) else {
            return ApplyOutcome::Applied;
        };
        obstacle.hp -= self.config.projectile_damage;
        if obstacle.hp > 0 {
            return ApplyOutcome::Applied;
        }

        // Depleted by hits the attacker had not seen. Remove it now; if it
        // is ours, settle the destruction for everyone.
        let id = m.obstacle_id.clone();
        let owned = self.registry.is_owned(&id);
        self.destroy(&id);
        if owned {
            out.push(Message::ObstacleDestroyed(ObstacleDestroyedMsg {
                id,
                reason: DestroyReason::Bullet,
            }));
        }
        ApplyOutcome::Applied
    }

    fn avatar_hit(&mut self, m: &AvatarHitMsg) -> ApplyOutcome {
        if m.identity == self.local() {
            return ApplyOutcome::Ignored;
        }
        let removed = self.destroy(&m.obstacle_id) == ApplyOutcome::Applied;
        let Some(avatar) = self.world.avatar_mut(&m.identity) else {
            return if removed {
                ApplyOutcome::Applied
            } else {
                ApplyOutcome::Ignored
            };
        };
        if m.hp < avatar.hp {
            avatar.hp = m.hp;
            ApplyOutcome::Applied
        } else if removed {
            ApplyOutcome::Applied
        } else {
            ApplyOutcome::Duplicate
        }
    }

    /// Everything the local peer owns, for a resync reply.
    pub fn owned_state(&self) -> StateSnapshotMsg {
        let local = self.local().to_string();
        let avatar = self
            .world
            .avatar(&local)
            .cloned()
            .unwrap_or_else(|| Avatar::new(local.as_str(), self.config));
        StateSnapshotMsg {
            avatar,
            obstacles: self
                .world
                .obstacles
                .values()
                .filter(|o| self.registry.is_owned(&o.id))
                .cloned()
                .collect(),
            projectiles: self
                .world
                .projectiles
                .values()
                .filter(|p| self.registry.is_owned(&p.id))
                .cloned()
                .collect(),
            identity: local,
        }
    }

    /// Merge a resync reply. Only entities owned by the sender are taken.
    fn merge_snapshot(&mut self, m: &StateSnapshotMsg) -> ApplyOutcome {
        if m.identity == self.local() || m.avatar.identity != m.identity {
            return ApplyOutcome::Ignored;
        }
        // Avatars come from the relay roster, never from gossip
        let Some(avatar) = self.world.avatar_mut(&m.identity) else {
            return ApplyOutcome::Ignored;
        };
        let mut changed = false;
        let before = avatar.clone();
        avatar.x = m.avatar.x;
        avatar.y = m.avatar.y;
        avatar.score = avatar.score.max(m.avatar.score);
        avatar.hp = avatar.hp.min(m.avatar.hp);
        avatar.alive = avatar.alive && m.avatar.alive;
        changed |= *avatar != before;

        for obstacle in m.obstacles.iter().filter(|o| o.id.owner == m.identity) {
            if self.registry.is_owned(&obstacle.id) {
                continue;
            }
            match self.world.obstacles.get_mut(&obstacle.id) {
                Some(held) => {
                    held.x = obstacle.x;
                    held.y = obstacle.y;
                    held.vy = obstacle.vy;
                    held.hp = held.hp.min(obstacle.hp);
                    changed = true;
                },
                None => changed |= self.world.insert_obstacle(obstacle.clone()),
            }
        }
        for projectile in m.projectiles.iter().filter(|p| p.id.owner == m.identity) {
            if self.registry.is_owned(&projectile.id) {
                continue;
            }
            match self.world.projectiles.get_mut(&projectile.id) {
                Some(held) => {
                    held.x = projectile.x;
                    held.y = projectile.y;
                    changed = true;
                },
                None => changed |= self.world.insert_projectile(projectile.clone()),
            }
        }

        if changed {
            ApplyOutcome::Applied
        } else {
            ApplyOutcome::Duplicate
        }
    }
}
