//! Connection lifecycle state.

use crate::error::LinkError;
use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

/// Lifecycle of one connection instance.
///
/// ```text
/// Idle ─▶ Connecting ─▶ Handshaking ─▶ Ready
///             │              │           │
///             └──────────────┴───────────┴──▶ Failed
///
/// any ─▶ Closed (close())
/// ```
///
/// `Closed` and `Failed` are terminal for the instance; there is no reconnect.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ConnectionState {
    Idle = 0,
    Connecting = 1,
    Handshaking = 2,
    Ready = 3,
    Closed = 4,
    Failed = 5,
}

impl ConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::Idle => "idle",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Handshaking => "handshaking",
            ConnectionState::Ready => "ready",
            ConnectionState::Closed => "closed",
            ConnectionState::Failed => "failed",
        }
    }

    /// No further transitions out of this state (except Failed → Closed)
    pub fn is_terminal(&self) -> bool {
        matches!(self, ConnectionState::Closed | ConnectionState::Failed)
    }

    /// Connect or handshake still in flight
    pub fn is_pending(&self) -> bool {
        matches!(
            self,
            ConnectionState::Connecting | ConnectionState::Handshaking
        )
    }

    fn from_u8(v: u8) -> Self {
        match v {
            0 => ConnectionState::Idle,
            1 => ConnectionState::Connecting,
            2 => ConnectionState::Handshaking,
            3 => ConnectionState::Ready,
            4 => ConnectionState::Closed,
            _ => ConnectionState::Failed,
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lock-free connection state cell.
///
/// Written only by the connection manager (handle and I/O thread); read by
/// anyone. Transitions are compare-and-swap so a concurrent `close()` is
/// never overwritten by a late I/O completion.
#[derive(Debug)]
pub struct LinkState(AtomicU8);

impl LinkState {
    pub fn new() -> Self {
        Self(AtomicU8::new(ConnectionState::Idle as u8))
    }

    #[inline]
    pub fn load(&self) -> ConnectionState {
        ConnectionState::from_u8(self.0.load(Ordering::Acquire))
    }

    /// Move `from → to`. Returns false if the state was not `from`.
    pub fn transition(&self, from: ConnectionState, to: ConnectionState) -> bool {
        self.0
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Force `Closed`, returning the previous state
    pub fn close(&self) -> ConnectionState {
        ConnectionState::from_u8(self.0.swap(ConnectionState::Closed as u8, Ordering::AcqRel))
    }
}

impl Default for LinkState {
    fn default() -> Self {
        Self::new()
    }
}

/// Notifications posted by the I/O thread, drained by the tick loop
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LinkEvent {
    /// The connection entered a new state
    StateChanged(ConnectionState),
    /// An I/O failure was observed (state is `Failed` by the time this arrives)
    Error(LinkError),
}
