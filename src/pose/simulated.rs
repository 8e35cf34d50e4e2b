//! Simulated trackers moving on circular trajectories.

use super::PoseSource;
use crate::config::{Config, TrajectoryConfig};
use crate::core::{Position, Vec3};
use crate::error::{Error, Result};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;
use std::f32::consts::TAU;
use std::time::Duration;

/// One simulated tracker
#[derive(Clone, Debug)]
struct Tracker {
    id: String,
    trajectory: TrajectoryConfig,
}

impl Tracker {
    /// Position on the XZ orbit at time `t` (seconds), before jitter
    fn position_at(&self, t: f32) -> Vec3 {
        let origin = self.trajectory.origin;
        let r = self.trajectory.radius;
        if r <= 0.0 {
            return origin;
        }
        let angle = TAU * t / self.trajectory.period_secs;
        origin + Vec3::new(r * angle.cos(), 0.0, r * angle.sin())
    }
}

/// Pair of simulated trackers driven by configuration
pub struct SimulatedTrackers {
    source: Tracker,
    target: Tracker,
    /// Jitter source; seed 0 draws from OS entropy
    rng: SmallRng,
}

impl SimulatedTrackers {
    pub fn new(
        source_id: &str,
        source: TrajectoryConfig,
        target_id: &str,
        target: TrajectoryConfig,
        seed: u64,
    ) -> Self {
        Self {
            source: Tracker {
                id: source_id.to_string(),
                trajectory: source,
            },
            target: Tracker {
                id: target_id.to_string(),
                trajectory: target,
            },
            rng: match seed {
                0 => SmallRng::from_entropy(),
                seed => SmallRng::seed_from_u64(seed),
            },
        }
    }

    /// Build from the `[trackers]` and `[simulation]` sections
    pub fn from_config(config: &Config) -> Result<Self> {
        let lookup = |id: &str| {
            config
                .simulation
                .trackers
                .get(id)
                .cloned()
                .ok_or_else(|| Error::Pose(format!("unknown tracker '{}'", id)))
        };

        let source = lookup(&config.trackers.source_id)?;
        let target = lookup(&config.trackers.target_id)?;

        log::info!(
            "Simulated trackers: {} (r={:.2}m) -> {} (r={:.2}m)",
            config.trackers.source_id,
            source.radius,
            config.trackers.target_id,
            target.radius
        );

        Ok(Self::new(
            &config.trackers.source_id,
            source,
            &config.trackers.target_id,
            target,
            config.simulation.random_seed,
        ))
    }

    /// Independent zero-mean Gaussian offset on each axis
    fn jitter(&mut self, stddev: f32) -> Vec3 {
        if stddev <= 0.0 {
            return Vec3::ZERO;
        }
        let mut axis = || self.rng.sample::<f32, _>(StandardNormal) * stddev;
        Vec3::new(axis(), axis(), axis())
    }
}

impl PoseSource for SimulatedTrackers {
    fn positions(&mut self, elapsed: Duration) -> Result<(Position, Position)> {
        let t = elapsed.as_secs_f32();
        let source_noise = self.source.trajectory.noise_stddev;
        let target_noise = self.target.trajectory.noise_stddev;

        let source = self.source.position_at(t) + self.jitter(source_noise);
        let target = self.target.position_at(t) + self.jitter(target_noise);
        Ok((source, target))
    }

    fn tracker_ids(&self) -> (&str, &str) {
        (&self.source.id, &self.target.id)
    }
}
