//! Brownian particle simulator producing per-frame spots with ground truth.
//!
//! Each frame, in order:
//! 1. live particles diffuse (Gaussian step per axis, reflected at the box walls)
//! 2. some die, some divide into two daughters, new ones appear (Poisson)
//! 3. each live particle is detected with probability `p_detection`
//!
//! A true link joins two consecutive detections of the same particle. Daughters
//! inherit the mother's last detection, so their first detections are linked to
//! it (a split).

use anyhow::ensure;
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use rand_distr::{Normal, Poisson};
use serde::{Deserialize, Serialize};
use tracker_core::{FrameIndex, Spot, SpotCollection, SpotId};

/// Feature names attached to every simulated spot.
pub const MEAN_INTENSITY: &str = "MEAN_INTENSITY";
pub const RADIUS: &str = "RADIUS";

/// Knobs of one simulation run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ParticleParams {
    /// Particles alive at frame 0
    pub n_particles: usize,
    pub n_frames: u32,
    /// Side of the square field of view
    pub box_size: f64,
    /// Std of the per-axis Brownian step, per frame
    pub diffusion_std: f64,
    /// Std of the localisation error added to each detection
    pub localization_std: f64,
    pub p_detection: f64,
    /// Mean number of particles appearing per frame
    pub birth_rate: f64,
    /// Per-frame probability that a particle disappears
    pub p_death: f64,
    /// Per-frame probability that a particle divides
    pub p_division: f64,
    /// Distance between the two daughters right after a division
    pub division_distance: f64,
    pub intensity_mean: f64,
    /// Per-particle base intensity is drawn in `mean ± spread`
    pub intensity_spread: f64,
    /// Frame-to-frame intensity noise
    pub intensity_noise_std: f64,
    pub radius: f64,
}

impl Default for ParticleParams {
    fn default() -> Self {
        Self {
            n_particles: 20,
            n_frames: 30,
            box_size: 200.0,
            diffusion_std: 1.0,
            localization_std: 0.0,
            p_detection: 1.0,
            birth_rate: 0.0,
            p_death: 0.0,
            p_division: 0.0,
            division_distance: 4.0,
            intensity_mean: 100.0,
            intensity_spread: 30.0,
            intensity_noise_std: 5.0,
            radius: 2.5,
        }
    }
}

/// Spots of a simulated movie plus the links a perfect tracker would find.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SimulatedMovie {
    /// All detections, frame order
    pub spots: Vec<Spot>,
    /// Every imaged frame, including those where nothing was detected
    pub frames: Vec<FrameIndex>,
    pub truth_links: Vec<(SpotId, SpotId)>,
}

impl SimulatedMovie {
    /// Spot collection with every imaged frame registered.
    pub fn collection(&self) -> tracker_core::Result<SpotCollection> {
        let mut collection = SpotCollection::new();
        for &frame in &self.frames {
            collection.ensure_frame(frame);
        }
        for spot in &self.spots {
            collection.add(spot.clone())?;
        }
        Ok(collection)
    }
}

#[derive(Clone, Debug)]
struct Particle {
    position: [f64; 2],
    intensity: f64,
    last_detection: Option<SpotId>,
}

/// Seeded simulator; the same params and seed always give the same movie.
pub struct ParticleSimulator {
    params: ParticleParams,
    rng: ChaCha8Rng,
    step: Normal<f64>,
    localization: Normal<f64>,
    intensity_noise: Normal<f64>,
    births: Option<Poisson<f64>>,
    particles: Vec<Particle>,
    next_spot_id: u64,
}

impl ParticleSimulator {
    pub fn new(params: ParticleParams, seed: u64) -> anyhow::Result<Self> {
        for (name, p) in [
            ("p_detection", params.p_detection),
            ("p_death", params.p_death),
            ("p_division", params.p_division),
        ] {
            ensure!((0.0..=1.0).contains(&p), "{name} must be a probability, got {p}");
        }
        ensure!(params.box_size > 0.0, "box size must be > 0");
        ensure!(params.birth_rate >= 0.0, "birth rate must be >= 0");

        let births = if params.birth_rate > 0.0 {
            Some(Poisson::new(params.birth_rate)?)
        } else {
            None
        };
        let mut sim = Self {
            step: Normal::new(0.0, params.diffusion_std)?,
            localization: Normal::new(0.0, params.localization_std)?,
            intensity_noise: Normal::new(0.0, params.intensity_noise_std)?,
            births,
            rng: ChaCha8Rng::seed_from_u64(seed),
            particles: Vec::new(),
            next_spot_id: 0,
            params,
        };
        for _ in 0..sim.params.n_particles {
            let particle = sim.spawn();
            sim.particles.push(particle);
        }
        Ok(sim)
    }

    /// Simulate every frame.
    pub fn run(mut self) -> SimulatedMovie {
        let mut movie = SimulatedMovie::default();
        for frame in 0..self.params.n_frames {
            if frame > 0 {
                self.evolve();
            }
            self.detect(frame, &mut movie);
            movie.frames.push(frame);
        }
        movie
    }

    fn spawn(&mut self) -> Particle {
        let size = self.params.box_size;
        let spread = self.params.intensity_spread;
        let offset = if spread > 0.0 {
            self.rng.gen_range(-spread..=spread)
        } else {
            0.0
        };
        Particle {
            position: [self.rng.gen_range(0.0..size), self.rng.gen_range(0.0..size)],
            intensity: self.params.intensity_mean + offset,
            last_detection: None,
        }
    }

    fn evolve(&mut self) {
        let size = self.params.box_size;
        let mut next = Vec::with_capacity(self.particles.len());
        let particles = std::mem::take(&mut self.particles);

        for mut particle in particles {
            for x in particle.position.iter_mut() {
                *x = reflect(*x + self.step.sample(&mut self.rng), size);
            }
            if self.rng.gen_bool(self.params.p_death) {
                continue;
            }
            if self.rng.gen_bool(self.params.p_division) {
                let angle = self.rng.gen_range(0.0..std::f64::consts::TAU);
                let half = 0.5 * self.params.division_distance;
                let (dx, dy) = (half * angle.cos(), half * angle.sin());
                let [x, y] = particle.position;
                for sign in [1.0, -1.0] {
                    next.push(Particle {
                        position: [reflect(x + sign * dx, size), reflect(y + sign * dy, size)],
                        ..particle.clone()
                    });
                }
                continue;
            }
            next.push(particle);
        }

        let n_births = match &self.births {
            Some(births) => births.sample(&mut self.rng) as usize,
            None => 0,
        };
        for _ in 0..n_births {
            let particle = self.spawn();
            next.push(particle);
        }
        self.particles = next;
    }

    fn detect(&mut self, frame: FrameIndex, movie: &mut SimulatedMovie) {
        for i in 0..self.particles.len() {
            if !self.rng.gen_bool(self.params.p_detection) {
                continue;
            }
            let id = SpotId(self.next_spot_id);
            self.next_spot_id += 1;

            let particle = &self.particles[i];
            let position = vec![
                particle.position[0] + self.localization.sample(&mut self.rng),
                particle.position[1] + self.localization.sample(&mut self.rng),
            ];
            let intensity = particle.intensity + self.intensity_noise.sample(&mut self.rng);
            movie.spots.push(
                Spot::new(id.0, frame, position)
                    .with_feature(MEAN_INTENSITY, intensity.max(0.0))
                    .with_feature(RADIUS, self.params.radius),
            );
            if let Some(previous) = particle.last_detection {
                movie.truth_links.push((previous, id));
            }
            self.particles[i].last_detection = Some(id);
        }
    }
}

/// Fold `x` back into `[0, size]` as if the walls were mirrors.
fn reflect(x: f64, size: f64) -> f64 {
    let period = 2.0 * size;
    let m = x.rem_euclid(period);
    if m > size {
        period - m
    } else {
        m
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
