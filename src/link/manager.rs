//! Connection manager: async connect, one-shot handshake, best-effort send.
//!
//! # Protocol
//!
//! ```text
//! client                                  peer
//!   │ ── TCP connect ───────────────────▶ │
//!   │ ── "StartRecording\n" ────────────▶ │   handshake (no reply expected)
//!   │ ── record line ───────────────────▶ │
//!   │ ── record line ───────────────────▶ │
//!   ⋮
//! ```
//!
//! No length prefix and no acknowledgment. `Ready` means the handshake write
//! succeeded, not that the peer has read it.
//!
//! # Threading
//!
//! [`ConnectionManager::connect`] returns immediately; a `link-io` thread
//! performs the connect, writes the handshake, then drains a bounded queue of
//! payloads onto the socket one at a time. [`ConnectionManager::send`] only
//! enqueues, so the caller never blocks on the network.

use super::state::{ConnectionState, LinkEvent, LinkState};
use crate::config::ConnectionConfig;
use crate::error::LinkError;
use crossbeam_channel::{
    Receiver, RecvTimeoutError, Sender, TryIter, TrySendError, bounded, unbounded,
};
use log::{debug, info, warn};
use parking_lot::Mutex;
use std::io::Write;
use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// How often the I/O thread re-checks for `close()` while idle
const IDLE_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Transfer counters for one connection
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LinkStats {
    /// Bytes written, handshake included
    pub bytes_sent: u64,
    /// Payloads written after the handshake
    pub payloads_sent: u64,
}

/// State shared between the handle and the I/O thread
#[derive(Default)]
struct LinkShared {
    last_error: Mutex<Option<LinkError>>,
    peer: Mutex<Option<SocketAddr>>,
    bytes_sent: AtomicU64,
    payloads_sent: AtomicU64,
}

/// Owns the single outbound connection of a session
pub struct ConnectionManager {
    state: Arc<LinkState>,
    shared: Arc<LinkShared>,
    handshake: Vec<u8>,
    connect_timeout: Duration,
    queue_capacity: usize,
    outbound: Option<Sender<Vec<u8>>>,
    events_tx: Sender<LinkEvent>,
    events_rx: Receiver<LinkEvent>,
    io_thread: Option<JoinHandle<()>>,
}

impl ConnectionManager {
    /// Create an idle manager.
    ///
    /// `handshake_token` is written once, terminated by `\n`, right after the
    /// connection is established.
    pub fn new(handshake_token: &str, connect_timeout: Duration, queue_capacity: usize) -> Self {
        let mut handshake = handshake_token.as_bytes().to_vec();
        if !handshake.ends_with(b"\n") {
            handshake.push(b'\n');
        }
        let (events_tx, events_rx) = unbounded();

        Self {
            state: Arc::new(LinkState::new()),
            shared: Arc::new(LinkShared::default()),
            handshake,
            connect_timeout,
            queue_capacity: queue_capacity.max(1),
            outbound: None,
            events_tx,
            events_rx,
            io_thread: None,
        }
    }

    pub fn from_config(config: &ConnectionConfig) -> Self {
        Self::new(
            &config.handshake_token,
            Duration::from_millis(config.connect_timeout_ms),
            config.queue_capacity,
        )
    }

    /// Start connecting to `address:port` in the background.
    ///
    /// Returns once the I/O thread is spawned. Progress is reported through
    /// [`state`](Self::state) and [`drain_events`](Self::drain_events).
    pub fn connect(&mut self, address: &str, port: u16) -> Result<(), LinkError> {
        if !self
            .state
            .transition(ConnectionState::Idle, ConnectionState::Connecting)
        {
            return Err(LinkError::AlreadyStarted(self.state.load().as_str()));
        }
        let _ = self
            .events_tx
            .send(LinkEvent::StateChanged(ConnectionState::Connecting));

        let (tx, rx) = bounded(self.queue_capacity);
        let ctx = IoContext {
            address: address.to_string(),
            port,
            connect_timeout: self.connect_timeout,
            handshake: self.handshake.clone(),
            state: Arc::clone(&self.state),
            shared: Arc::clone(&self.shared),
            events: self.events_tx.clone(),
            outbound: rx,
        };

        info!("Connecting to {}:{} (timeout {:?})", address, port, self.connect_timeout);

        let handle = thread::Builder::new()
            .name("link-io".to_string())
            .spawn(move || ctx.run());

        match handle {
            Ok(handle) => {
                self.outbound = Some(tx);
                self.io_thread = Some(handle);
                Ok(())
            }
            Err(e) => {
                let err = LinkError::Connect {
                    addr: format!("{}:{}", address, port),
                    reason: format!("failed to spawn link thread: {}", e),
                };
                if self
                    .state
                    .transition(ConnectionState::Connecting, ConnectionState::Failed)
                {
                    let _ = self
                        .events_tx
                        .send(LinkEvent::StateChanged(ConnectionState::Failed));
                }
                *self.shared.last_error.lock() = Some(err.clone());
                Err(err)
            }
        }
    }

    /// Queue `bytes` for a single write on the stream.
    ///
    /// Only valid in `Ready`. Never blocks: a full queue drops the payload.
    pub fn send(&self, bytes: &[u8]) -> Result<(), LinkError> {
        let state = self.state.load();
        if state != ConnectionState::Ready {
            return Err(LinkError::NotReady(state.as_str()));
        }

        let Some(tx) = self.outbound.as_ref() else {
            return Err(LinkError::NotReady(state.as_str()));
        };

        match tx.try_send(bytes.to_vec()) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => Err(LinkError::QueueFull(tx.len())),
            Err(TrySendError::Disconnected(_)) => {
                Err(LinkError::Transport("link thread exited".to_string()))
            }
        }
    }

    /// Close the connection. Idempotent; valid from any state.
    ///
    /// Does not wait for an in-flight connect; the I/O thread notices the
    /// `Closed` state and releases the socket on its own. Payloads already
    /// queued are written before the socket is shut down.
    pub fn close(&mut self) {
        let previous = self.state.close();
        self.outbound = None;

        if previous != ConnectionState::Closed {
            info!("Connection closed (was {})", previous);
            let _ = self
                .events_tx
                .send(LinkEvent::StateChanged(ConnectionState::Closed));
        }
    }

    /// Current lifecycle state
    pub fn state(&self) -> ConnectionState {
        self.state.load()
    }

    /// Events posted since the last drain (non-blocking)
    pub fn drain_events(&self) -> TryIter<'_, LinkEvent> {
        self.events_rx.try_iter()
    }

    /// Most recent I/O error, if any
    pub fn last_error(&self) -> Option<LinkError> {
        self.shared.last_error.lock().clone()
    }

    /// Remote address once connected
    pub fn peer_addr(&self) -> Option<SocketAddr> {
        *self.shared.peer.lock()
    }

    pub fn stats(&self) -> LinkStats {
        LinkStats {
            bytes_sent: self.shared.bytes_sent.load(Ordering::Relaxed),
            payloads_sent: self.shared.payloads_sent.load(Ordering::Relaxed),
        }
    }

    /// Block until the connection leaves `Connecting`/`Handshaking` or
    /// `timeout` elapses; returns the state observed last.
    ///
    /// Intended for tooling and tests, never the tick loop.
    pub fn wait_settled(&self, timeout: Duration) -> ConnectionState {
        let deadline = Instant::now() + timeout;
        loop {
            let state = self.state.load();
            if !state.is_pending() || Instant::now() >= deadline {
                return state;
            }
            thread::sleep(Duration::from_millis(2));
        }
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        self.close();

        if let Some(handle) = self.io_thread.take() {
            let _ = handle.join();
        }
    }
}

/// Everything the I/O thread owns
struct IoContext {
    address: String,
    port: u16,
    connect_timeout: Duration,
    handshake: Vec<u8>,
    state: Arc<LinkState>,
    shared: Arc<LinkShared>,
    events: Sender<LinkEvent>,
    outbound: Receiver<Vec<u8>>,
}

impl IoContext {
    fn run(self) {
        let target = format!("{}:{}", self.address, self.port);

        // Connecting
        let mut stream = match self.open_stream() {
            Ok(stream) => stream,
            Err(reason) => {
                self.fail(
                    ConnectionState::Connecting,
                    LinkError::Connect {
                        addr: target,
                        reason,
                    },
                );
                return;
            }
        };

        if let Ok(peer) = stream.peer_addr() {
            *self.shared.peer.lock() = Some(peer);
        }
        if let Err(e) = stream.set_nodelay(true) {
            debug!("Failed to set TCP_NODELAY: {}", e);
        }
        // Bounds how long a stalled peer can hold the thread (and Drop)
        if let Err(e) = stream.set_write_timeout(Some(self.connect_timeout)) {
            debug!("Failed to set write timeout: {}", e);
        }

        if !self.advance(ConnectionState::Connecting, ConnectionState::Handshaking) {
            debug!("Link closed during connect to {}", target);
            let _ = stream.shutdown(Shutdown::Both);
            return;
        }

        // Handshaking
        if let Err(e) = stream.write_all(&self.handshake).and_then(|_| stream.flush()) {
            self.fail(ConnectionState::Handshaking, LinkError::Handshake(e.to_string()));
            let _ = stream.shutdown(Shutdown::Both);
            return;
        }
        self.shared
            .bytes_sent
            .fetch_add(self.handshake.len() as u64, Ordering::Relaxed);

        if !self.advance(ConnectionState::Handshaking, ConnectionState::Ready) {
            debug!("Link closed during handshake with {}", target);
            let _ = stream.shutdown(Shutdown::Both);
            return;
        }
        info!("Handshake sent to {}; link ready", target);

        // Ready: single writer, payloads in queue order
        loop {
            match self.outbound.recv_timeout(IDLE_POLL_INTERVAL) {
                Ok(payload) => {
                    // Payloads accepted before close() are still flushed
                    if self.state.load() == ConnectionState::Failed {
                        break;
                    }
                    if let Err(e) = stream.write_all(&payload) {
                        self.fail(ConnectionState::Ready, LinkError::Transport(e.to_string()));
                        break;
                    }
                    self.shared
                        .bytes_sent
                        .fetch_add(payload.len() as u64, Ordering::Relaxed);
                    let sent = self.shared.payloads_sent.fetch_add(1, Ordering::Relaxed) + 1;
                    if sent % 1000 == 0 {
                        debug!("Streamed {} records to {}", sent, target);
                    }
                }
                Err(RecvTimeoutError::Timeout) => {
                    if self.state.load() != ConnectionState::Ready {
                        break;
                    }
                }
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }

        let _ = stream.shutdown(Shutdown::Both);
        debug!(
            "Link thread exiting ({} payloads to {})",
            self.shared.payloads_sent.load(Ordering::Relaxed),
            target
        );
    }

    /// Resolve and connect, trying every resolved address in turn
    fn open_stream(&self) -> Result<TcpStream, String> {
        let addrs = (self.address.as_str(), self.port)
            .to_socket_addrs()
            .map_err(|e| format!("address resolution failed: {}", e))?;

        let mut last_err = None;
        for addr in addrs {
            match TcpStream::connect_timeout(&addr, self.connect_timeout) {
                Ok(stream) => return Ok(stream),
                Err(e) => {
                    debug!("Connect attempt to {} failed: {}", addr, e);
                    last_err = Some(e);
                }
            }
        }

        Err(match last_err {
            Some(e) => e.to_string(),
            None => "address resolved to nothing".to_string(),
        })
    }

    fn advance(&self, from: ConnectionState, to: ConnectionState) -> bool {
        if self.state.transition(from, to) {
            let _ = self.events.send(LinkEvent::StateChanged(to));
            true
        } else {
            false
        }
    }

    /// `from → Failed`, unless the link was closed meanwhile
    fn fail(&self, from: ConnectionState, err: LinkError) {
        if self.advance(from, ConnectionState::Failed) {
            warn!("Link failed: {}", err);
            *self.shared.last_error.lock() = Some(err.clone());
            let _ = self.events.send(LinkEvent::Error(err));
        } else {
            debug!("Ignoring error after close: {}", err);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use std::net::TcpListener;

    const SETTLE: Duration = Duration::from_secs(5);

    fn manager() -> ConnectionManager {
        ConnectionManager::new("StartRecording", Duration::from_secs(2), 16)
    }

    /// Port that was free a moment ago; nothing listens on it
    fn unused_port() -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    }

    #[test]
    fn test_send_before_connect_is_not_ready() {
        let m = manager();
        assert_eq!(m.state(), ConnectionState::Idle);
        assert_eq!(m.send(b"x"), Err(LinkError::NotReady("idle")));
    }

    #[test]
    fn test_connect_refused_fails() {
        let mut m = manager();
        m.connect("127.0.0.1", unused_port()).unwrap();

        assert_eq!(m.wait_settled(SETTLE), ConnectionState::Failed);
        assert!(matches!(m.last_error(), Some(LinkError::Connect { .. })));
        assert!(matches!(m.send(b"x"), Err(LinkError::NotReady("failed"))));

        let events: Vec<LinkEvent> = m.drain_events().collect();
        assert_eq!(
            events.first(),
            Some(&LinkEvent::StateChanged(ConnectionState::Connecting))
        );
        assert!(events.contains(&LinkEvent::StateChanged(ConnectionState::Failed)));
        assert!(events.iter().any(|e| matches!(e, LinkEvent::Error(_))));
    }

    #[test]
    fn test_connect_twice_rejected() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();

        let mut m = manager();
        m.connect("127.0.0.1", port).unwrap();
        assert!(matches!(
            m.connect("127.0.0.1", port),
            Err(LinkError::AlreadyStarted(_))
        ));
    }

    #[test]
    fn test_handshake_then_payload() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();

        let mut m = manager();
        m.connect("127.0.0.1", port).unwrap();
        let (mut peer, _) = listener.accept().unwrap();

        assert_eq!(m.wait_settled(SETTLE), ConnectionState::Ready);
        assert!(m.peer_addr().is_some());
        m.send(b"line one\n").unwrap();
        m.close();

        let mut received = String::new();
        peer.read_to_string(&mut received).unwrap();
        assert_eq!(received, "StartRecording\nline one\n");
    }

    #[test]
    fn test_close_is_idempotent() {
        let mut m = manager();
        m.close();
        m.close();
        assert_eq!(m.state(), ConnectionState::Closed);

        let closed_events = m
            .drain_events()
            .filter(|e| *e == LinkEvent::StateChanged(ConnectionState::Closed))
            .count();
        assert_eq!(closed_events, 1);
        assert_eq!(m.send(b"x"), Err(LinkError::NotReady("closed")));
    }

    #[test]
    fn test_token_keeps_existing_newline() {
        let m = ConnectionManager::new("GO\n", Duration::from_secs(1), 4);
        assert_eq!(m.handshake, b"GO\n");
    }
}
