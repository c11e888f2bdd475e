use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// How a room decides that a game is over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum WinMode {
    /// Ends once any alive avatar reaches the given score.
    Score(u32),
    /// Ends once the room has been running for the given duration.
    TimeLimit(Duration),
}

impl Default for WinMode {
    fn default() -> Self {
        Self::Score(50)
    }
}

impl WinMode {
    pub fn score_target(&self) -> Option<u32> {
        match self {
            Self::Score(target) => Some(*target),
            Self::TimeLimit(_) => None,
        }
    }

    pub fn time_limit(&self) -> Option<Duration> {
        match self {
            Self::Score(_) => None,
            Self::TimeLimit(limit) => Some(*limit),
        }
    }
}

impl FromStr for WinMode {
    type Err = String;

    /// Parses the room option strings: `SCORE_50`, `SCORE_100`, `TIME_1M`, `TIME_5M`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(target) = s.strip_prefix("SCORE_") {
            return target
                .parse::<u32>()
                .map(Self::Score)
                .map_err(|_| format!("invalid score target in win mode: {s}"));
        }
        if let Some(minutes) = s.strip_prefix("TIME_").and_then(|t| t.strip_suffix('M')) {
            return minutes
                .parse::<u64>()
                .ok()
                .and_then(|m| m.checked_mul(60))
                .map(|secs| Self::TimeLimit(Duration::from_secs(secs)))
                .ok_or_else(|| format!("invalid minute count in win mode: {s}"));
        }
        Err(format!("unknown win mode: {s}"))
    }
}

impl fmt::Display for WinMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Score(target) => write!(f, "SCORE_{target}"),
            Self::TimeLimit(limit) => write!(f, "TIME_{}M", limit.as_secs() / 60),
        }
    }
}

impl TryFrom<String> for WinMode {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<WinMode> for String {
    fn from(mode: WinMode) -> Self {
        mode.to_string()
    }
}

/// Data-driven configuration for one peer's session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Arena width (units).
    pub arena_width: f32,
    /// Arena height (units). Y grows downward.
    pub arena_height: f32,
    /// Avatar movement speed (units/s).
    pub avatar_speed: f32,
    /// Avatar collision half-width.
    pub avatar_half_width: f32,
    /// Avatar collision half-height.
    pub avatar_half_height: f32,
    /// Avatars cannot climb higher than this distance from the top edge.
    pub avatar_top_margin: f32,
    /// Spawn position of every avatar.
    pub avatar_start_x: f32,
    pub avatar_start_y: f32,
    /// Hit points an avatar starts with.
    pub avatar_max_hp: i32,
    /// Hit points lost per obstacle impact.
    pub impact_damage: i32,
    /// Minimum time between two shots (seconds).
    pub fire_interval: f32,
    /// Projectile speed (units/s, travels upward).
    pub projectile_speed: f32,
    pub projectile_radius: f32,
    pub projectile_damage: i32,
    /// Time between obstacle spawns (seconds).
    pub spawn_interval: f32,
    /// Maximum obstacles a peer may own at once.
    pub max_owned_obstacles: usize,
    /// Horizontal margin kept free when picking a spawn x.
    pub spawn_margin: f32,
    /// Spawn height (just above the visible arena).
    pub spawn_y: f32,
    pub obstacle_min_speed: f32,
    pub obstacle_max_speed: f32,
    /// Probability that a spawned obstacle is large.
    pub large_probability: f64,
    pub large_radius: f32,
    pub large_hp: i32,
    pub large_reward: u32,
    pub small_radius: f32,
    pub small_hp: i32,
    pub small_reward: u32,
    /// Obstacles are out of bounds once `y - radius` passes `arena_height` plus this.
    pub obstacle_exit_margin: f32,
    /// Projectiles are out of bounds once `y + radius` is above minus this.
    pub projectile_exit_margin: f32,
    /// Avatar position broadcast rate (Hz).
    pub avatar_send_rate: f32,
    /// Obstacle/projectile position broadcast rate (Hz).
    pub entity_send_rate: f32,
    pub win_mode: WinMode,
    /// Seed for spawn randomness. `None` picks a random seed.
    pub seed: Option<u64>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            arena_width: 480.0,
            arena_height: 640.0,
            avatar_speed: 220.0,
            avatar_half_width: 14.0,
            avatar_half_height: 20.0,
            avatar_top_margin: 40.0,
            avatar_start_x: 240.0,
            avatar_start_y: 580.0,
            avatar_max_hp: 3,
            impact_damage: 1,
            fire_interval: 0.2,
            projectile_speed: 400.0,
            projectile_radius: 4.0,
            projectile_damage: 1,
            spawn_interval: 0.8,
            max_owned_obstacles: 10,
            spawn_margin: 30.0,
            spawn_y: -30.0,
            obstacle_min_speed: 80.0,
            obstacle_max_speed: 160.0,
            large_probability: 0.4,
            large_radius: 26.0,
            large_hp: 2,
            large_reward: 10,
            small_radius: 16.0,
            small_hp: 1,
            small_reward: 5,
            obstacle_exit_margin: 40.0,
            projectile_exit_margin: 20.0,
            avatar_send_rate: 20.0,
            entity_send_rate: 10.0,
            win_mode: WinMode::default(),
            seed: None,
        }
    }
}

impl SessionConfig {
    /// Load config from environment or TOML file, falling back to defaults.
    pub fn load() -> Self {
        if let Ok(path) = std::env::var("ROCKFALL_CONFIG")
            && let Some(config) = Self::from_file(&path)
        {
            return config;
        }
        Self::from_file("config/rockfall.toml").unwrap_or_default()
    }

    /// Parse a TOML file. Missing files are skipped quietly, malformed ones
    /// with a warning.
    fn from_file(path: &str) -> Option<Self> {
        let contents = std::fs::read_to_string(path).ok()?;
        match toml::from_str::<Self>(&contents) {
            Ok(config) => Some(config),
            Err(e) => {
                tracing::warn!(path = %path, error = %e, "Ignoring invalid session config");
                None
            },
        }
    }

    /// Whether an obstacle at `y` with `radius` has left the arena.
    pub fn obstacle_out_of_bounds(&self, y: f32, radius: f32) -> bool {
        y - radius > self.arena_height + self.obstacle_exit_margin
    }

    /// Whether a projectile at `y` has left the arena.
    pub fn projectile_out_of_bounds(&self, y: f32) -> bool {
        y + self.projectile_radius < -self.projectile_exit_margin
    }
}
