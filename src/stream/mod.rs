//! Tick-driven measurement pipeline.
//!
//! ```text
//! PoseSource ─▶ VectorSampler ─▶ RecordFormatter ─┬─▶ LogSink            (every tick)
//!                                                 └─▶ ConnectionManager  (once armed)
//! ```

pub mod controller;
pub mod ticker;

pub use controller::{ArmState, StreamController, StreamStats, TickOutcome};
pub use ticker::TickLoop;
