//! Local collision tests against the merged world, and the declarations
//! the local peer is entitled to make about them.

use crate::authority::{self, Action, DestroyReason, Parties};
use crate::config::SessionConfig;
use crate::entity::{EntityId, EntityKind, Obstacle, SizeClass};
use crate::net::messages::{
    AvatarEliminatedMsg, AvatarHitMsg, Message, ObstacleDestroyedMsg, ProjectileDestroyedMsg,
    ProjectileHitObstacleMsg, ScoreReason, ScoreUpdateMsg,
};
use crate::ownership::OwnershipRegistry;
use crate::world::World;

/// Circle-circle overlap.
pub fn circles_overlap(ax: f32, ay: f32, ar: f32, bx: f32, by: f32, br: f32) -> bool {
    let dx = ax - bx;
    let dy = ay - by;
    (dx * dx + dy * dy).sqrt() < ar + br
}

/// Circle against an axis-aligned box, using the box expanded by the radius.
pub fn circle_touches_box(cx: f32, cy: f32, r: f32, bx: f32, by: f32, hw: f32, hh: f32) -> bool {
    (cx - bx).abs() <= hw + r && (cy - by).abs() <= hh + r
}

/// Run every collision test the local peer is responsible for and append the
/// resulting declarations to `out`.
pub fn resolve(
    config: &SessionConfig,
    registry: &mut OwnershipRegistry,
    world: &mut World,
    out: &mut Vec<Message>,
) {
    resolve_projectiles(config, registry, world, out);
    resolve_avatar(config, registry, world, out);
}

/// Owned projectiles against every obstacle, owned or mirrored.
fn resolve_projectiles(
    config: &SessionConfig,
    registry: &mut OwnershipRegistry,
    world: &mut World,
    out: &mut Vec<Message>,
) {
    let local = registry.local_peer().to_string();
    let owned: Vec<EntityId> = world
        .projectiles
        .keys()
        .filter(|id| registry.is_owned(id))
        .cloned()
        .collect();

    for projectile_id in owned {
        let Some(projectile) = world.projectiles.get(&projectile_id) else {
            continue;
        };
        let (px, py) = (projectile.x, projectile.y);
        let target = world
            .obstacles
            .values()
            .find(|o| circles_overlap(px, py, config.projectile_radius, o.x, o.y, o.radius))
            .map(|o| o.id.clone());
        let Some(obstacle_id) = target else {
            continue;
        };

        let parties = Parties {
            owner: &obstacle_id.owner,
            attacker: Some(&local),
            collider: None,
        };
        if !authority::permits(EntityKind::Obstacle, Action::Damage, &local, parties) {
            continue;
        }

        let Some(obstacle) = world.obstacles.get_mut(&obstacle_id) else {
            continue;
        };
        obstacle.hp -= config.projectile_damage;
        let destroyed = obstacle.hp <= 0;
        let size = obstacle.size;
        tracing::debug!(
            projectile = %projectile_id,
            obstacle = %obstacle_id,
            hp = obstacle.hp,
            destroyed,
            "Projectile hit obstacle"
        );

        world.mark_hit_applied(&projectile_id);
        out.push(Message::ProjectileHitObstacle(ProjectileHitObstacleMsg {
            obstacle_id: obstacle_id.clone(),
            projectile_id: projectile_id.clone(),
            attacker: local.clone(),
            obstacle_owner: obstacle_id.owner.clone(),
            destroyed,
        }));

        world.retire(&projectile_id);
        registry.release(&projectile_id);
        out.push(Message::ProjectileDestroyed(ProjectileDestroyedMsg {
            id: projectile_id,
            reason: DestroyReason::Bullet,
        }));

        if destroyed
            && authority::permits(
                EntityKind::Obstacle,
                Action::Destroy(DestroyReason::Bullet),
                &local,
                parties,
            )
        {
            world.retire(&obstacle_id);
            registry.release(&obstacle_id);
            out.push(Message::ObstacleDestroyed(ObstacleDestroyedMsg {
                id: obstacle_id,
                reason: DestroyReason::Bullet,
            }));
            award(config, &local, size, world, out);
        }
    }
}

fn award(
    config: &SessionConfig,
    local: &str,
    size: SizeClass,
    world: &mut World,
    out: &mut Vec<Message>,
) {
    let Some(avatar) = world.avatar_mut(local) else {
        return;
    };
    avatar.score += size.reward(config);
    out.push(Message::ScoreUpdate(ScoreUpdateMsg {
        identity: local.to_string(),
        score: avatar.score,
        reason: ScoreReason::ObstacleDestroyed(size),
    }));
}

/// The local avatar against every obstacle, owned or mirrored.
fn resolve_avatar(
    config: &SessionConfig,
    registry: &mut OwnershipRegistry,
    world: &mut World,
    out: &mut Vec<Message>,
) {
    let local = registry.local_peer().to_string();
    let Some(avatar) = world.avatar(&local) else {
        return;
    };
    if !avatar.alive {
        return;
    }
    let (ax, ay) = (avatar.x, avatar.y);
    let hits: Vec<EntityId> = world
        .obstacles
        .values()
        .filter(|o| touches_avatar(config, ax, ay, o))
        .map(|o| o.id.clone())
        .collect();

    for obstacle_id in hits {
        let parties = Parties {
            owner: &obstacle_id.owner,
            attacker: None,
            collider: Some(&local),
        };
        let action = Action::Destroy(DestroyReason::AvatarImpact);
        if !authority::permits(EntityKind::Obstacle, action, &local, parties) {
            continue;
        }

        world.retire(&obstacle_id);
        registry.release(&obstacle_id);
        out.push(Message::ObstacleDestroyed(ObstacleDestroyedMsg {
            id: obstacle_id.clone(),
            reason: DestroyReason::AvatarImpact,
        }));

        let Some(avatar) = world.avatar_mut(&local) else {
            return;
        };
        avatar.hp -= config.impact_damage;
        let eliminated = avatar.hp <= 0;
        if eliminated {
            avatar.hp = 0;
            avatar.alive = false;
        }
        out.push(Message::AvatarHit(AvatarHitMsg {
            identity: local.clone(),
            obstacle_id,
            hp: avatar.hp,
        }));
        if eliminated {
            tracing::info!(peer = %local, "Avatar eliminated");
            out.push(Message::AvatarEliminated(AvatarEliminatedMsg {
                identity: local.clone(),
            }));
            return;
        }
    }
}

fn touches_avatar(config: &SessionConfig, ax: f32, ay: f32, obstacle: &Obstacle) -> bool {
    circle_touches_box(
        obstacle.x,
        obstacle.y,
        obstacle.radius,
        ax,
        ay,
        config.avatar_half_width,
        config.avatar_half_height,
    )
}
