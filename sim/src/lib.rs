//! `sim` - Scenario simulator: diffusing particles, per-frame spots, replay.

pub mod particles;
pub mod replay;
pub mod scenarios;

pub use particles::{ParticleParams, ParticleSimulator, SimulatedMovie, MEAN_INTENSITY, RADIUS};
pub use replay::{load_spot_log, save_spot_log, SpotLog};
pub use scenarios::{Scenario, ScenarioKind};
