//! Configuration for DishaStream
//!
//! Loaded from a TOML file. Every field has a default, so an empty file (or
//! no file at all) yields a runnable configuration.
//!
//! ```toml
//! [connection]
//! address = "127.0.0.1"
//! port = 12346
//! handshake_token = "StartRecording"
//!
//! [record]
//! path = "tracker_log.txt"
//! label = "some/path/to/sound/file.wav"
//!
//! [trackers]
//! source_id = "tracker_1"
//! target_id = "tracker_2"
//!
//! [simulation.tracker_1]
//! origin = [0.0, 1.0, 0.0]
//!
//! [simulation.tracker_2]
//! origin = [0.0, 1.0, 0.0]
//! radius = 0.5
//! period_secs = 4.0
//! ```

use crate::core::Vec3;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Top-level configuration
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub connection: ConnectionConfig,
    #[serde(default)]
    pub record: RecordConfig,
    #[serde(default)]
    pub trackers: TrackerConfig,
    #[serde(default)]
    pub simulation: SimulationConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Remote listener settings
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ConnectionConfig {
    /// Listener host name or IP (default: 127.0.0.1)
    #[serde(default = "default_address")]
    pub address: String,

    /// Listener TCP port (default: 12346)
    #[serde(default = "default_port")]
    pub port: u16,

    /// Connect timeout in milliseconds (default: 5000)
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_ms: u64,

    /// Token written once after connecting (default: StartRecording)
    #[serde(default = "default_handshake_token")]
    pub handshake_token: String,

    /// Records buffered between the tick loop and the socket (default: 256)
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

/// Record log settings
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct RecordConfig {
    /// Append-only log file (default: tracker_log.txt)
    #[serde(default = "default_record_path")]
    pub path: String,

    /// Label written into every record (default: unlabeled)
    #[serde(default = "default_label")]
    pub label: String,

    /// Decimals per vector component (default: 2)
    #[serde(default = "default_precision")]
    pub precision: usize,
}

/// Which trackers to measure between
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct TrackerConfig {
    /// Source tracker id (default: tracker_1)
    #[serde(default = "default_source_id")]
    pub source_id: String,

    /// Target tracker id (default: tracker_2)
    #[serde(default = "default_target_id")]
    pub target_id: String,

    /// Scale for the per-tick rate-scaled direction diagnostic (default: 4.0)
    #[serde(default = "default_direction_scale")]
    pub direction_scale: f32,
}

/// Simulated tracker source and tick scheduling
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct SimulationConfig {
    /// Tick rate of the measurement loop in Hz (default: 90)
    #[serde(default = "default_tick_rate")]
    pub tick_rate_hz: f32,

    /// Seed for position jitter; 0 = fresh entropy each run
    #[serde(default)]
    pub random_seed: u64,

    /// Trajectory per tracker id
    #[serde(flatten)]
    pub trackers: BTreeMap<String, TrajectoryConfig>,
}

/// Circular trajectory in the XZ plane around `origin`
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct TrajectoryConfig {
    /// Orbit center in meters
    #[serde(default)]
    pub origin: Vec3,

    /// Orbit radius in meters; 0 keeps the tracker still
    #[serde(default)]
    pub radius: f32,

    /// Seconds per revolution (default: 4.0)
    #[serde(default = "default_period")]
    pub period_secs: f32,

    /// Gaussian jitter per axis in meters
    #[serde(default)]
    pub noise_stddev: f32,
}

/// Logging settings
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Default log level when RUST_LOG is unset (default: info)
    #[serde(default = "default_log_level")]
    pub level: String,
}

// Default value functions
fn default_address() -> String {
    "127.0.0.1".to_string()
}
fn default_port() -> u16 {
    12346
}
fn default_connect_timeout() -> u64 {
    5000
}
fn default_handshake_token() -> String {
    "StartRecording".to_string()
}
fn default_queue_capacity() -> usize {
    256
}
fn default_record_path() -> String {
    "tracker_log.txt".to_string()
}
fn default_label() -> String {
    "unlabeled".to_string()
}
fn default_precision() -> usize {
    crate::record::DEFAULT_PRECISION
}
fn default_source_id() -> String {
    "tracker_1".to_string()
}
fn default_target_id() -> String {
    "tracker_2".to_string()
}
fn default_direction_scale() -> f32 {
    4.0
}
fn default_tick_rate() -> f32 {
    90.0
}
fn default_period() -> f32 {
    4.0
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            address: default_address(),
            port: default_port(),
            connect_timeout_ms: default_connect_timeout(),
            handshake_token: default_handshake_token(),
            queue_capacity: default_queue_capacity(),
        }
    }
}

impl Default for RecordConfig {
    fn default() -> Self {
        Self {
            path: default_record_path(),
            label: default_label(),
            precision: default_precision(),
        }
    }
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            source_id: default_source_id(),
            target_id: default_target_id(),
            direction_scale: default_direction_scale(),
        }
    }
}

impl Default for TrajectoryConfig {
    fn default() -> Self {
        Self {
            origin: Vec3::ZERO,
            radius: 0.0,
            period_secs: default_period(),
            noise_stddev: 0.0,
        }
    }
}

/// Two trackers one meter apart at head height; the target circles the source.
impl Default for SimulationConfig {
    fn default() -> Self {
        let mut trackers = BTreeMap::new();
        trackers.insert(
            default_source_id(),
            TrajectoryConfig {
                origin: Vec3::new(0.0, 1.2, 0.0),
                ..Default::default()
            },
        );
        trackers.insert(
            default_target_id(),
            TrajectoryConfig {
                origin: Vec3::new(0.0, 1.2, 0.0),
                radius: 1.0,
                ..Default::default()
            },
        );
        Self {
            tick_rate_hz: default_tick_rate(),
            random_seed: 0,
            trackers,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Config {
    /// Load and validate configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_toml(&content)
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Check cross-field constraints
    pub fn validate(&self) -> Result<()> {
        if self.connection.address.trim().is_empty() {
            return Err(Error::Config("connection.address is empty".into()));
        }
        if self.connection.port == 0 {
            return Err(Error::Config("connection.port must be non-zero".into()));
        }
        if self.connection.connect_timeout_ms == 0 {
            return Err(Error::Config(
                "connection.connect_timeout_ms must be non-zero".into(),
            ));
        }
        if self.record.precision > 9 {
            return Err(Error::Config(format!(
                "record.precision {} exceeds 9",
                self.record.precision
            )));
        }
        if !(self.simulation.tick_rate_hz > 0.0 && self.simulation.tick_rate_hz.is_finite()) {
            return Err(Error::Config(format!(
                "simulation.tick_rate_hz must be positive, got {}",
                self.simulation.tick_rate_hz
            )));
        }
        for id in [&self.trackers.source_id, &self.trackers.target_id] {
            let Some(trajectory) = self.simulation.trackers.get(id) else {
                return Err(Error::Config(format!(
                    "tracker '{}' has no [simulation.{}] table",
                    id, id
                )));
            };
            if trajectory.radius > 0.0 && trajectory.period_secs <= 0.0 {
                return Err(Error::Config(format!(
                    "simulation.{}.period_secs must be positive",
                    id
                )));
            }
        }
        Ok(())
    }

    /// `address:port` of the remote listener
    pub fn remote(&self) -> String {
        format!("{}:{}", self.connection.address, self.connection.port)
    }
}
