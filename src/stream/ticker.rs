//! Fixed-rate tick scheduler.
//!
//! Stands in for the host's frame loop: every period it pulls positions from
//! a [`PoseSource`] and feeds them to the [`StreamController`]. Deadlines are
//! absolute, so a slow tick shortens the next sleep instead of drifting.

use super::controller::StreamController;
use crate::pose::PoseSource;
use crate::sink::LogSink;
use log::{debug, info, warn};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

/// Drives a controller at a fixed rate until stopped
pub struct TickLoop {
    period: Duration,
    running: Arc<AtomicBool>,
    max_ticks: Option<u64>,
}

impl TickLoop {
    /// `rate_hz` ticks per second; the loop runs while `running` is set
    pub fn new(rate_hz: f32, running: Arc<AtomicBool>) -> Self {
        let period = Duration::from_secs_f64(1.0 / f64::from(rate_hz.max(f32::EPSILON)));
        Self {
            period,
            running,
            max_ticks: None,
        }
    }

    /// Stop after `n` ticks (0 = unlimited)
    pub fn with_max_ticks(mut self, n: u64) -> Self {
        self.max_ticks = (n > 0).then_some(n);
        self
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Run until the running flag clears or the tick limit is hit.
    ///
    /// Returns the number of ticks executed.
    pub fn run<P, S>(&self, source: &mut P, controller: &mut StreamController<S>) -> u64
    where
        P: PoseSource + ?Sized,
        S: LogSink,
    {
        let (source_id, target_id) = source.tracker_ids();
        info!(
            "Tick loop running at {:.1} Hz ({} -> {})",
            1.0 / self.period.as_secs_f32(),
            source_id,
            target_id
        );

        let start = Instant::now();
        let mut last = start;
        let mut next_deadline = start;
        let mut ticks = 0u64;
        let mut overruns = 0u64;
        let mut pose_failures = 0u64;

        while self.running.load(Ordering::Relaxed) {
            if self.max_ticks.is_some_and(|max| ticks >= max) {
                break;
            }

            let now = Instant::now();
            let delta = if ticks == 0 {
                self.period
            } else {
                now.duration_since(last)
            };
            last = now;

            match source.positions(now.duration_since(start)) {
                Ok((a, b)) => {
                    controller.on_tick(a, b, delta.as_secs_f32());
                }
                Err(e) => {
                    pose_failures += 1;
                    if pose_failures == 1 || pose_failures % 100 == 0 {
                        warn!("Pose source failed ({} total): {}", pose_failures, e);
                    }
                }
            }
            ticks += 1;

            next_deadline += self.period;
            let now = Instant::now();
            if next_deadline > now {
                thread::sleep(next_deadline - now);
            } else {
                overruns += 1;
                if overruns % 100 == 1 {
                    debug!("Tick overran its period ({} overruns)", overruns);
                }
                next_deadline = now;
            }
        }

        info!(
            "Tick loop stopped after {} ticks ({:.1}s, {} overruns, {} pose failures)",
            ticks,
            start.elapsed().as_secs_f32(),
            overruns,
            pose_failures
        );
        ticks
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Position, Vec3};
    use crate::error::{Error, Result};
    use crate::link::ConnectionManager;
    use crate::record::RecordFormatter;
    use crate::sink::MemorySink;

    struct Fixed;

    impl PoseSource for Fixed {
        fn positions(&mut self, _elapsed: Duration) -> Result<(Position, Position)> {
            Ok((Vec3::ZERO, Vec3::new(0.0, 1.0, 0.0)))
        }

        fn tracker_ids(&self) -> (&str, &str) {
            ("a", "b")
        }
    }

    struct Flaky {
        calls: u32,
    }

    impl PoseSource for Flaky {
        fn positions(&mut self, _elapsed: Duration) -> Result<(Position, Position)> {
            self.calls += 1;
            if self.calls % 2 == 0 {
                Err(Error::Pose("tracker lost".into()))
            } else {
                Ok((Vec3::ZERO, Vec3::ZERO))
            }
        }

        fn tracker_ids(&self) -> (&str, &str) {
            ("a", "b")
        }
    }

    fn controller(sink: MemorySink) -> StreamController<MemorySink> {
        let link = ConnectionManager::new("StartRecording", Duration::from_secs(1), 8);
        StreamController::new(sink, link, RecordFormatter::default(), "tick")
    }

    #[test]
    fn test_runs_requested_ticks() {
        let sink = MemorySink::new();
        let mut ctl = controller(sink.clone());
        let running = Arc::new(AtomicBool::new(true));

        let ticks = TickLoop::new(500.0, running)
            .with_max_ticks(10)
            .run(&mut Fixed, &mut ctl);

        assert_eq!(ticks, 10);
        assert_eq!(sink.len(), 10);
    }

    #[test]
    fn test_stops_when_flag_cleared() {
        let sink = MemorySink::new();
        let mut ctl = controller(sink.clone());
        let running = Arc::new(AtomicBool::new(false));

        let ticks = TickLoop::new(500.0, running).run(&mut Fixed, &mut ctl);
        assert_eq!(ticks, 0);
        assert!(sink.is_empty());
    }

    #[test]
    fn test_pose_failures_skip_tick() {
        let sink = MemorySink::new();
        let mut ctl = controller(sink.clone());
        let running = Arc::new(AtomicBool::new(true));

        let ticks = TickLoop::new(1000.0, running)
            .with_max_ticks(6)
            .run(&mut Flaky { calls: 0 }, &mut ctl);

        assert_eq!(ticks, 6);
        assert_eq!(sink.len(), 3);
    }

    #[test]
    fn test_period_from_rate() {
        let tick = TickLoop::new(100.0, Arc::new(AtomicBool::new(true)));
        assert_eq!(tick.period(), Duration::from_millis(10));
    }
}
