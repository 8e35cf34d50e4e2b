//! DishaStream - tracker displacement streaming
//!
//! Measures the vector between two tracked points once per tick, appends
//! every measurement to a local log file, and streams the same records to a
//! remote listener over TCP once a start-of-session handshake has been sent.
//!
//! ## Modules
//!
//! - [`core`]: `Vec3` and the per-tick [`core::VectorSampler`]
//! - [`record`]: tab-delimited record encoding shared by file and wire
//! - [`sink`]: durable log sinks
//! - [`link`]: outbound TCP connection with background connect/handshake
//! - [`stream`]: the tick-driven controller and fixed-rate scheduler
//! - [`pose`]: tracker position sources

pub mod config;
pub mod core;
pub mod error;
pub mod link;
pub mod pose;
pub mod record;
pub mod sink;
pub mod stream;

// Re-export commonly used types
pub use config::Config;
pub use error::{Error, LinkError, Result};
