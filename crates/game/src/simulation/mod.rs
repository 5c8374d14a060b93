mod collision;
mod config;
mod engine;
mod timestep;

pub use collision::{CollisionOutcome, resolve};
pub use config::EngineConfig;
pub use engine::SimulationEngine;
pub use timestep::{FixedTimestep, MAX_FRAME_DELTA};
