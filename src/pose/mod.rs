//! Tracker pose sources.
//!
//! The measurement loop pulls one position per tracker per tick through
//! [`PoseSource`]. Real tracking hardware lives outside this crate; the
//! [`SimulatedTrackers`] source lets the daemon run end to end without it.

mod simulated;

pub use simulated::SimulatedTrackers;

use crate::core::Position;
use crate::error::Result;
use std::time::Duration;

/// Supplies the source and target positions for one tick
pub trait PoseSource: Send {
    /// Positions of (source, target) at `elapsed` since session start
    fn positions(&mut self, elapsed: Duration) -> Result<(Position, Position)>;

    /// Human-readable identifiers of (source, target)
    fn tracker_ids(&self) -> (&str, &str);
}
