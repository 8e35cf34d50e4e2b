//! Error types for DishaStream

use std::io;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// DishaStream error types
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O error (log file, config file)
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Configuration could not be read or is invalid
    #[error("Configuration error: {0}")]
    Config(String),

    /// Telemetry link error
    #[error("Link error: {0}")]
    Link(#[from] LinkError),

    /// Pose source could not supply positions
    #[error("Pose source error: {0}")]
    Pose(String),
}

impl From<toml::de::Error> for Error {
    fn from(e: toml::de::Error) -> Self {
        Error::Config(e.to_string())
    }
}

/// Errors raised by the outbound telemetry connection.
///
/// All of these are recovered at the connection/controller boundary; none of
/// them stop the tick loop or the log sink.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LinkError {
    /// Connect attempt failed (unresolvable, refused, unreachable, timed out)
    #[error("connect to {addr} failed: {reason}")]
    Connect { addr: String, reason: String },

    /// Connected, but the handshake token could not be written
    #[error("handshake write failed: {0}")]
    Handshake(String),

    /// Send attempted while the connection is not Ready
    #[error("connection not ready (state: {0})")]
    NotReady(&'static str),

    /// Write failed after reaching Ready (peer reset, broken pipe)
    #[error("transport write failed: {0}")]
    Transport(String),

    /// Outbound hand-off queue is full; payload dropped
    #[error("outbound queue full ({0} pending)")]
    QueueFull(usize),

    /// `connect` called on an instance that already left Idle
    #[error("connection already started (state: {0})")]
    AlreadyStarted(&'static str),
}

impl LinkError {
    /// Short machine-friendly name, used in log lines and counters
    pub fn kind(&self) -> &'static str {
        match self {
            LinkError::Connect { .. } => "connect",
            LinkError::Handshake(_) => "handshake",
            LinkError::NotReady(_) => "not_ready",
            LinkError::Transport(_) => "transport",
            LinkError::QueueFull(_) => "queue_full",
            LinkError::AlreadyStarted(_) => "already_started",
        }
    }
}
