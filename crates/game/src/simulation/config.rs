use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Physics ticks per second.
    pub physics_rate: u32,
    /// Frame notifications per second.
    pub display_rate: u32,
    /// Ticks between asteroid spawn attempts.
    pub spawn_interval: u64,
    pub initial_asteroid_limit: usize,
    /// Minimum distance between a new asteroid and the local ship.
    pub spawn_exclusion_radius: f32,
    /// Every time a score reaches a multiple of this, one more asteroid may
    /// be alive at once.
    pub points_per_limit: u32,
    /// Lets asteroids destroy each other.
    pub chain_reaction: bool,
    pub seed: Option<u64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            physics_rate: 30,
            display_rate: 120,
            spawn_interval: 200,
            initial_asteroid_limit: 7,
            spawn_exclusion_radius: 50.0,
            points_per_limit: 5,
            chain_reaction: false,
            seed: None,
        }
    }
}

impl EngineConfig {
    pub fn physics_period(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.physics_rate.max(1) as f64)
    }

    pub fn display_period(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.display_rate.max(1) as f64)
    }
}
