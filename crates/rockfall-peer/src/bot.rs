use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use rockfall_core::entity::{Avatar, Obstacle};
use rockfall_core::world::World;
use rockfall_core::{AvatarInput, PeerSession, SessionConfig};

/// Distance from the arena edge at which the sweep turns around.
const EDGE_MARGIN: f32 = 20.0;

/// How far above the avatar a falling obstacle counts as a threat.
const DODGE_RANGE: f32 = 160.0;

/// Extra horizontal clearance kept from a threat.
const DODGE_CLEARANCE: f32 = 8.0;

/// Mixed into the session seed so the pilot and the spawner draw different streams.
const PILOT_SEED_SALT: u64 = 0x5EED_B075;

/// Scripted input source: sweeps side to side firing continuously, reverses
/// at random intervals, and sidesteps obstacles about to land on it.
#[derive(Debug)]
pub struct Pilot {
    rng: StdRng,
    heading: f32,
    /// Seconds until the next chance to reverse.
    hold: f32,
}

impl Pilot {
    pub fn new(seed: Option<u64>) -> Self {
        let seed = seed.map_or_else(rand::random, |s| s ^ PILOT_SEED_SALT);
        Self {
            rng: StdRng::seed_from_u64(seed),
            heading: 1.0,
            hold: 1.0,
        }
    }

    pub fn next_input(&mut self, dt: f32, session: &PeerSession) -> AvatarInput {
        let config = session.config();
        let Some(me) = session.world().avatar(session.identity()) else {
            return AvatarInput::default();
        };
        if !me.alive {
            return AvatarInput::default();
        }

        let edge = config.avatar_half_width + EDGE_MARGIN;
        if me.x <= edge {
            self.heading = 1.0;
        } else if me.x >= config.arena_width - edge {
            self.heading = -1.0;
        } else {
            self.hold -= dt;
            if self.hold <= 0.0 {
                if self.rng.random_bool(0.5) {
                    self.heading = -self.heading;
                }
                self.hold = self.rng.random_range(0.4..1.6);
            }
        }

        if let Some(threat) = closest_threat(me, session.world(), config) {
            self.heading = if threat.x > me.x { -1.0 } else { 1.0 };
        }

        AvatarInput {
            move_x: self.heading,
            move_y: 0.0,
            fire: true,
        }
    }
}

/// The lowest obstacle falling into the avatar's column.
fn closest_threat<'a>(me: &Avatar, world: &'a World, config: &SessionConfig) -> Option<&'a Obstacle> {
    world
        .obstacles
        .values()
        .filter(|o| o.y < me.y && me.y - o.y < DODGE_RANGE)
        .filter(|o| (o.x - me.x).abs() < o.radius + config.avatar_half_width + DODGE_CLEARANCE)
        .max_by(|a, b| a.y.total_cmp(&b.y))
}
