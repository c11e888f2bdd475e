use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::authority::{self, Action, DestroyReason, Parties};
use crate::config::SessionConfig;
use crate::entity::{EntityKind, Obstacle, Projectile, SizeClass};
use crate::net::messages::{
    Message, ObstacleDestroyedMsg, ObstacleSpawnMsg, ProjectileDestroyedMsg, ProjectileFiredMsg,
};
use crate::ownership::OwnershipRegistry;
use crate::world::World;

/// Input for the local avatar on one tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AvatarInput {
    /// Horizontal direction, -1.0 (left) to 1.0 (right).
    pub move_x: f32,
    /// Vertical direction, -1.0 (up) to 1.0 (down).
    pub move_y: f32,
    pub fire: bool,
}

/// Advances the entities the local peer owns.
#[derive(Debug, Clone)]
pub struct LocalSimulation {
    rng: StdRng,
    spawn_timer: f32,
}

impl LocalSimulation {
    pub fn new(seed: Option<u64>) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed.unwrap_or_else(rand::random)),
            spawn_timer: 0.0,
        }
    }

    /// Run one tick of local simulation. `clock` is the session time in
    /// seconds after this tick's `dt` has been added. Creation and removal
    /// events go straight into `out`.
    #[allow(clippy::too_many_arguments)]
    pub fn step(
        &mut self,
        dt: f32,
        clock: f64,
        input: &AvatarInput,
        config: &SessionConfig,
        registry: &mut OwnershipRegistry,
        world: &mut World,
        out: &mut Vec<Message>,
    ) {
        move_avatar(dt, input, config, registry, world);
        if input.fire {
            fire(clock, config, registry, world, out);
        }
        advance_owned(dt, config, registry, world, out);
        self.spawn(dt, config, registry, world, out);
    }

    fn spawn(
        &mut self,
        dt: f32,
        config: &SessionConfig,
        registry: &mut OwnershipRegistry,
        world: &mut World,
        out: &mut Vec<Message>,
    ) {
        self.spawn_timer += dt;
        if self.spawn_timer < config.spawn_interval
            || owned_obstacle_count(registry, world) >= config.max_owned_obstacles
        {
            return;
        }
        self.spawn_timer = 0.0;

        let size = if self.rng.random_bool(config.large_probability.clamp(0.0, 1.0)) {
            SizeClass::Large
        } else {
            SizeClass::Small
        };
        let x = if config.arena_width > 2.0 * config.spawn_margin {
            self.rng
                .random_range(config.spawn_margin..config.arena_width - config.spawn_margin)
        } else {
            config.arena_width / 2.0
        };
        let vy = if config.obstacle_max_speed > config.obstacle_min_speed {
            self.rng
                .random_range(config.obstacle_min_speed..config.obstacle_max_speed)
        } else {
            config.obstacle_min_speed
        };
        let obstacle = Obstacle {
            id: registry.allocate(),
            x,
            y: config.spawn_y,
            vy,
            radius: size.radius(config),
            hp: size.hit_points(config),
            size,
        };
        tracing::debug!(id = %obstacle.id, ?size, x, "Spawned obstacle");
        out.push(Message::ObstacleSpawn(ObstacleSpawnMsg::from_obstacle(
            &obstacle,
        )));
        world.insert_obstacle(obstacle);
    }
}

/// Normalize the input direction, integrate, and clamp to the arena.
fn move_avatar(
    dt: f32,
    input: &AvatarInput,
    config: &SessionConfig,
    registry: &OwnershipRegistry,
    world: &mut World,
) {
    let Some(avatar) = world.avatar_mut(registry.local_peer()) else {
        return;
    };
    if !avatar.alive {
        avatar.vx = 0.0;
        avatar.vy = 0.0;
        return;
    }
    let (mut dx, mut dy) = (input.move_x, input.move_y);
    let len = (dx * dx + dy * dy).sqrt();
    if len > 0.0 && len.is_finite() {
        dx /= len;
        dy /= len;
    } else {
        dx = 0.0;
        dy = 0.0;
    }
    avatar.vx = dx * config.avatar_speed;
    avatar.vy = dy * config.avatar_speed;
    avatar.x = (avatar.x + avatar.vx * dt).clamp(
        config.avatar_half_width,
        config.arena_width - config.avatar_half_width,
    );
    avatar.y = (avatar.y + avatar.vy * dt).clamp(
        config.avatar_half_height + config.avatar_top_margin,
        config.arena_height - config.avatar_half_height,
    );
}

/// Fire a projectile if the avatar is alive and off cooldown.
fn fire(
    clock: f64,
    config: &SessionConfig,
    registry: &mut OwnershipRegistry,
    world: &mut World,
    out: &mut Vec<Message>,
) {
    let local = registry.local_peer().to_string();
    let Some(avatar) = world.avatar_mut(&local) else {
        return;
    };
    if !avatar.alive {
        return;
    }
    if let Some(last) = avatar.last_fire
        && clock - last < f64::from(config.fire_interval)
    {
        return;
    }
    avatar.last_fire = Some(clock);
    let projectile = Projectile {
        id: registry.allocate(),
        owner: local,
        x: avatar.x,
        y: avatar.y - config.avatar_half_height,
        vy: -config.projectile_speed,
    };
    out.push(Message::ProjectileFired(ProjectileFiredMsg::from_projectile(
        &projectile,
    )));
    world.insert_projectile(projectile);
}

/// Move owned obstacles and projectiles, destroying any that left the arena.
fn advance_owned(
    dt: f32,
    config: &SessionConfig,
    registry: &mut OwnershipRegistry,
    world: &mut World,
    out: &mut Vec<Message>,
) {
    let mut exited = Vec::new();
    for obstacle in world.obstacles.values_mut() {
        if !registry.is_owned(&obstacle.id) {
            continue;
        }
        obstacle.y += obstacle.vy * dt;
        if config.obstacle_out_of_bounds(obstacle.y, obstacle.radius) {
            exited.push((EntityKind::Obstacle, obstacle.id.clone()));
        }
    }
    for projectile in world.projectiles.values_mut() {
        if !registry.is_owned(&projectile.id) {
            continue;
        }
        projectile.y += projectile.vy * dt;
        if config.projectile_out_of_bounds(projectile.y) {
            exited.push((EntityKind::Projectile, projectile.id.clone()));
        }
    }

    let reason = DestroyReason::OutOfBounds;
    for (kind, id) in exited {
        let local = registry.local_peer();
        if !authority::permits(kind, Action::Destroy(reason), local, Parties::owned_by(&id.owner))
        {
            continue;
        }
        world.retire(&id);
        registry.release(&id);
        out.push(match kind {
            EntityKind::Obstacle => Message::ObstacleDestroyed(ObstacleDestroyedMsg { id, reason }),
            _ => Message::ProjectileDestroyed(ProjectileDestroyedMsg { id, reason }),
        });
    }
}

fn owned_obstacle_count(registry: &OwnershipRegistry, world: &World) -> usize {
    world
        .obstacles
        .keys()
        .filter(|id| registry.is_owned(id))
        .count()
}
