//! Scenario definitions.
//!
//! Each scenario is a named particle configuration plus the tracker settings
//! suited to it. All scenarios are deterministic given the same seed.

use crate::particles::{ParticleParams, ParticleSimulator, SimulatedMovie, MEAN_INTENSITY};
use crate::replay::SpotLog;
use serde::{Deserialize, Serialize};
use tracker_core::TrackerSettings;

/// Which pre-defined scenario to load.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, clap::ValueEnum)]
pub enum ScenarioKind {
    /// 20 well separated particles, always detected
    Sparse,
    /// 20 particles missed 20% of the time: gap closing
    Blinking,
    /// 200 particles with births and deaths, intensity-aware linking
    Dense,
    /// 10 particles dividing now and then: splitting
    Dividing,
}

/// A fully configured simulation scenario.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Scenario {
    pub name: String,
    pub seed: u64,
    pub params: ParticleParams,
    /// Settings the tracker is expected to do well with
    pub settings: TrackerSettings,
}

impl Scenario {
    /// Build the named scenario. Uses `seed` for repeatability.
    pub fn build(kind: ScenarioKind, seed: u64) -> Self {
        match kind {
            ScenarioKind::Sparse => Self::sparse(seed),
            ScenarioKind::Blinking => Self::blinking(seed),
            ScenarioKind::Dense => Self::dense(seed),
            ScenarioKind::Dividing => Self::dividing(seed),
        }
    }

    /// Run the simulator.
    pub fn simulate(&self) -> anyhow::Result<SimulatedMovie> {
        Ok(ParticleSimulator::new(self.params.clone(), self.seed)?.run())
    }

    /// Run the simulator and wrap the movie for saving.
    pub fn spot_log(&self) -> anyhow::Result<SpotLog> {
        Ok(SpotLog {
            scenario_name: self.name.clone(),
            seed: self.seed,
            movie: self.simulate()?,
        })
    }

    // -----------------------------------------------------------------------
    // Sparse
    // -----------------------------------------------------------------------
    fn sparse(seed: u64) -> Self {
        let mut settings = TrackerSettings::default();
        settings.linking.max_distance = 6.0;
        settings.gap_closing.allowed = false;

        Scenario {
            name: "sparse".into(),
            seed,
            params: ParticleParams::default(),
            settings,
        }
    }

    // -----------------------------------------------------------------------
    // Blinking
    // -----------------------------------------------------------------------
    fn blinking(seed: u64) -> Self {
        let params = ParticleParams {
            n_frames: 40,
            p_detection: 0.8,
            ..Default::default()
        };
        let mut settings = TrackerSettings::default();
        settings.linking.max_distance = 6.0;
        settings.gap_closing.max_distance = 10.0;
        settings.gap_closing.max_frame_gap = 3;

        Scenario {
            name: "blinking".into(),
            seed,
            params,
            settings,
        }
    }

    // -----------------------------------------------------------------------
    // Dense
    // -----------------------------------------------------------------------
    fn dense(seed: u64) -> Self {
        let params = ParticleParams {
            n_particles: 200,
            n_frames: 50,
            box_size: 300.0,
            diffusion_std: 1.5,
            localization_std: 0.2,
            p_detection: 0.95,
            birth_rate: 1.0,
            p_death: 0.01,
            intensity_spread: 60.0,
            ..Default::default()
        };
        let mut settings = TrackerSettings::default();
        settings.linking.max_distance = 8.0;
        settings
            .linking
            .feature_penalties
            .insert(MEAN_INTENSITY.to_owned(), 1.0);
        settings.gap_closing.max_distance = 10.0;
        settings
            .gap_closing
            .feature_penalties
            .insert(MEAN_INTENSITY.to_owned(), 1.0);

        Scenario {
            name: "dense".into(),
            seed,
            params,
            settings,
        }
    }

    // -----------------------------------------------------------------------
    // Dividing
    // -----------------------------------------------------------------------
    fn dividing(seed: u64) -> Self {
        let params = ParticleParams {
            n_particles: 10,
            n_frames: 40,
            diffusion_std: 0.8,
            p_division: 0.02,
            division_distance: 4.0,
            ..Default::default()
        };
        let mut settings = TrackerSettings::default();
        settings.linking.max_distance = 5.0;
        settings.splitting.allowed = true;
        settings.splitting.max_distance = 6.0;

        Scenario {
            name: "dividing".into(),
            seed,
            params,
            settings,
        }
    }
}
