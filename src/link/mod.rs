//! Outbound telemetry link.
//!
//! One TCP connection per session, owned by a dedicated I/O thread:
//!
//! ```text
//! ┌──────────────┐  try_send(bytes)   ┌──────────────┐   write_all   ┌────────┐
//! │  Tick loop   │───────────────────▶│  link-io     │──────────────▶│  Peer  │
//! │ (controller) │◀───────────────────│  thread      │               └────────┘
//! └──────────────┘   LinkEvent chan   └──────────────┘
//!        │                                   │
//!        └──────── reads ──▶ LinkState ◀── writes
//! ```
//!
//! The tick loop never blocks on the socket: connect, handshake and every
//! write happen on `link-io`. The tick side observes progress through the
//! atomic [`LinkState`] and the [`LinkEvent`] channel.

pub mod manager;
pub mod state;

pub use manager::{ConnectionManager, LinkStats};
pub use state::{ConnectionState, LinkEvent, LinkState};
