//! Per-tick displacement sample between two tracked points.

use super::vector::{Position, Vec3};
use chrono::{DateTime, Local};

/// One tick's measurement: displacement from source to target.
///
/// Immutable once built; consumed by the record formatter and dropped.
#[derive(Clone, Debug, PartialEq)]
pub struct Sample {
    /// Wall-clock time the sample was taken
    pub timestamp: DateTime<Local>,
    /// Opaque label identifying the originating event
    pub label: String,
    /// `target - source`
    pub raw: Vec3,
    /// `raw` scaled to unit length, or zero when `raw` is zero
    pub normalized: Vec3,
    /// Source tracker position
    pub source: Position,
    /// Target tracker position
    pub target: Position,
    /// Tick duration in seconds
    pub delta_time: f32,
}

impl Sample {
    /// Normalized direction scaled by `scale * delta_time`.
    ///
    /// Per-frame step toward the target at `scale` units per second.
    #[inline]
    pub fn rate_scaled(&self, scale: f32) -> Vec3 {
        self.normalized * (scale * self.delta_time)
    }

    /// Distance between the two trackers
    #[inline]
    pub fn magnitude(&self) -> f32 {
        self.raw.length()
    }
}

/// Builds [`Sample`]s from pairs of tracker positions.
///
/// Stateless; `sample_at` is a pure function of its arguments.
#[derive(Clone, Copy, Debug, Default)]
pub struct VectorSampler;

impl VectorSampler {
    pub fn new() -> Self {
        Self
    }

    /// Sample stamped with the current local time
    pub fn sample(&self, source: Position, target: Position, delta_time: f32, label: &str) -> Sample {
        self.sample_at(source, target, delta_time, label, Local::now())
    }

    /// Sample with an explicit timestamp
    pub fn sample_at(
        &self,
        source: Position,
        target: Position,
        delta_time: f32,
        label: &str,
        timestamp: DateTime<Local>,
    ) -> Sample {
        let raw = target - source;
        Sample {
            timestamp,
            label: label.to_string(),
            raw,
            normalized: raw.normalize(),
            source,
            target,
            delta_time,
        }
    }
}
