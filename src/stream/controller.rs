//! Stream controller: per-tick sample → record → sinks, behind the arm gate.

use crate::config::Config;
use crate::core::{Position, VectorSampler};
use crate::error::LinkError;
use crate::link::{ConnectionManager, ConnectionState, LinkEvent};
use crate::record::{Record, RecordFormatter};
use crate::sink::LogSink;
use log::{debug, info, trace, warn};

/// Log every Nth repeat of a per-tick failure after the first
const REPEAT_LOG_INTERVAL: u64 = 500;

/// Session gate for network streaming.
///
/// ```text
/// Unarmed ──start_session──▶ Arming ──link Ready──▶ Armed (terminal)
///                              │
///                              └──link Failed/Closed──▶ Unarmed
/// ```
///
/// `Armed` is never left, and an instance can only be armed once: the
/// underlying connection cannot be restarted after it leaves `Idle`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ArmState {
    Unarmed,
    Arming,
    Armed,
}

/// Session counters
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StreamStats {
    pub ticks: u64,
    /// Records appended to the log sink
    pub records_logged: u64,
    /// Records handed to the link
    pub records_sent: u64,
    /// Records the link refused while armed
    pub records_dropped: u64,
    pub sink_failures: u64,
    pub link_errors: u64,
}

/// What happened to one tick's record
#[derive(Clone, Debug)]
pub struct TickOutcome {
    pub record: Record,
    /// Appended to the log sink
    pub logged: bool,
    /// Accepted by the link for transmission
    pub sent: bool,
}

/// Orchestrates one measurement session
pub struct StreamController<S: LogSink> {
    sampler: VectorSampler,
    formatter: RecordFormatter,
    sink: S,
    link: ConnectionManager,
    arm: ArmState,
    label: String,
    direction_scale: f32,
    stats: StreamStats,
    last_drop: Option<LinkError>,
}

impl<S: LogSink> StreamController<S> {
    pub fn new(sink: S, link: ConnectionManager, formatter: RecordFormatter, label: &str) -> Self {
        Self {
            sampler: VectorSampler::new(),
            formatter,
            sink,
            link,
            arm: ArmState::Unarmed,
            label: label.to_string(),
            direction_scale: 4.0,
            stats: StreamStats::default(),
            last_drop: None,
        }
    }

    /// Controller wired from configuration (link not yet connected)
    pub fn from_config(config: &Config, sink: S) -> Self {
        Self::new(
            sink,
            ConnectionManager::from_config(&config.connection),
            RecordFormatter::new(config.record.precision),
            &config.record.label,
        )
        .with_direction_scale(config.trackers.direction_scale)
    }

    /// Scale for the rate-scaled direction diagnostic
    pub fn with_direction_scale(mut self, scale: f32) -> Self {
        self.direction_scale = scale;
        self
    }

    /// Begin connecting to the listener; the tick loop keeps running meanwhile.
    pub fn start_session(&mut self, address: &str, port: u16) -> Result<(), LinkError> {
        if self.arm != ArmState::Unarmed {
            return Err(LinkError::AlreadyStarted(self.link.state().as_str()));
        }
        match self.link.connect(address, port) {
            Ok(()) => {
                self.arm = ArmState::Arming;
                info!("Session starting; streaming to {}:{} once armed", address, port);
                Ok(())
            }
            Err(e) => {
                warn!("Session start failed: {}", e);
                self.stats.link_errors += 1;
                Err(e)
            }
        }
    }

    /// Run one tick of the pipeline.
    ///
    /// The record always goes to the log sink. It goes to the link only when
    /// armed. Failures on either side are counted and logged, never returned.
    pub fn on_tick(&mut self, source: Position, target: Position, delta_time: f32) -> TickOutcome {
        self.poll_link();
        self.stats.ticks += 1;

        let sample = self.sampler.sample(source, target, delta_time, &self.label);
        trace!(
            "direction: {:.3} normalized step: {:.4}",
            sample.raw,
            sample.rate_scaled(self.direction_scale)
        );
        let record = self.formatter.format(&sample);

        let logged = match self.sink.append(&record) {
            Ok(()) => {
                self.stats.records_logged += 1;
                true
            }
            Err(e) => {
                self.stats.sink_failures += 1;
                if self.stats.sink_failures == 1
                    || self.stats.sink_failures % REPEAT_LOG_INTERVAL == 0
                {
                    warn!(
                        "Log sink append failed ({} total): {}",
                        self.stats.sink_failures, e
                    );
                }
                false
            }
        };

        let sent = self.arm == ArmState::Armed && self.transmit(&record);

        TickOutcome {
            record,
            logged,
            sent,
        }
    }

    /// Hand a record to the link; drop it on any error
    fn transmit(&mut self, record: &Record) -> bool {
        match self.link.send(record.as_bytes()) {
            Ok(()) => {
                self.stats.records_sent += 1;
                true
            }
            Err(e) => {
                self.stats.records_dropped += 1;
                let changed = self.last_drop.as_ref() != Some(&e);
                if changed || self.stats.records_dropped % REPEAT_LOG_INTERVAL == 0 {
                    warn!(
                        "Dropping record ({} dropped so far): {}",
                        self.stats.records_dropped, e
                    );
                }
                self.last_drop = Some(e);
                false
            }
        }
    }

    /// Drain link events and advance the arm gate
    fn poll_link(&mut self) {
        for event in self.link.drain_events() {
            match event {
                LinkEvent::StateChanged(state) => debug!("Link state: {}", state),
                LinkEvent::Error(e) => {
                    self.stats.link_errors += 1;
                    warn!("Link error ({}): {}", e.kind(), e);
                }
            }
        }

        let state = self.link.state();
        self.arm = match (self.arm, state) {
            (ArmState::Arming, ConnectionState::Ready) => {
                info!("Session armed; records now streamed to listener");
                ArmState::Armed
            }
            (ArmState::Arming, ConnectionState::Failed | ConnectionState::Closed) => {
                warn!("Link {} before handshake; session stays unarmed (log only)", state);
                ArmState::Unarmed
            }
            (arm, _) => arm,
        };
    }

    /// Close the link, flush the sink and log a summary
    pub fn shutdown(&mut self) -> StreamStats {
        self.poll_link();
        self.link.close();

        if let Err(e) = self.sink.flush() {
            warn!("Log sink flush failed: {}", e);
        }

        let link_stats = self.link.stats();
        info!(
            "Session summary: {} ticks, {} logged, {} streamed, {} dropped, {} sink failures, {} link errors",
            self.stats.ticks,
            self.stats.records_logged,
            self.stats.records_sent,
            self.stats.records_dropped,
            self.stats.sink_failures,
            self.stats.link_errors
        );
        info!(
            "Link: {} payloads / {} bytes written, final state {}",
            link_stats.payloads_sent,
            link_stats.bytes_sent,
            self.link.state()
        );

        self.stats
    }

    pub fn arm_state(&self) -> ArmState {
        self.arm
    }

    pub fn is_armed(&self) -> bool {
        self.arm == ArmState::Armed
    }

    pub fn stats(&self) -> StreamStats {
        self.stats
    }

    pub fn link(&self) -> &ConnectionManager {
        &self.link
    }

    pub fn link_mut(&mut self) -> &mut ConnectionManager {
        &mut self.link
    }
}
