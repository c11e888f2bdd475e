use crate::config::SessionConfig;
use crate::entity::EntityId;
use crate::ownership::OwnershipRegistry;
use crate::world::World;

/// Dead-reckon every mirrored obstacle and projectile by its last known
/// velocity. Mirrors that drift out of the arena are dropped from the local
/// view and tombstoned; no event is emitted for them.
///
/// Avatar mirrors are not advanced: only their absolute position is ever
/// transmitted, so between updates they hold still.
pub fn extrapolate(
    dt: f32,
    config: &SessionConfig,
    registry: &OwnershipRegistry,
    world: &mut World,
) -> Vec<EntityId> {
    let mut expired = Vec::new();
    for obstacle in world.obstacles.values_mut() {
        if registry.is_owned(&obstacle.id) {
            continue;
        }
        obstacle.y += obstacle.vy * dt;
        if config.obstacle_out_of_bounds(obstacle.y, obstacle.radius) {
            expired.push(obstacle.id.clone());
        }
    }
    for projectile in world.projectiles.values_mut() {
        if registry.is_owned(&projectile.id) {
            continue;
        }
        projectile.y += projectile.vy * dt;
        if config.projectile_out_of_bounds(projectile.y) {
            expired.push(projectile.id.clone());
        }
    }
    for id in &expired {
        tracing::trace!(id = %id, "Mirror left the arena");
        world.retire(id);
    }
    expired
}
