use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use tracing::warn;

static METRICS_LOCK_POISON_WARNED: AtomicBool = AtomicBool::new(false);

fn warn_metrics_lock_poison_once(operation: &'static str) {
    if METRICS_LOCK_POISON_WARNED
        .compare_exchange(false, true, Ordering::Relaxed, Ordering::Relaxed)
        .is_ok()
    {
        warn!(operation, "metrics lock poisoned; recovered inner value");
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LoopMetricsSnapshot {
    /// Ticks per wall-clock second over the last interval.
    pub tps: f32,
    /// Mean wall time spent inside one scene update.
    pub tick_cost_ms: f32,
    /// Simulated seconds advanced over the last interval.
    pub simulated_seconds: f32,
}

#[derive(Clone, Debug)]
pub struct MetricsHandle {
    snapshot: Arc<RwLock<LoopMetricsSnapshot>>,
}

impl Default for MetricsHandle {
    fn default() -> Self {
        Self {
            snapshot: Arc::new(RwLock::new(LoopMetricsSnapshot::default())),
        }
    }
}

impl MetricsHandle {
    pub fn snapshot(&self) -> LoopMetricsSnapshot {
        match self.snapshot.read() {
            Ok(guard) => *guard,
            Err(poisoned) => {
                warn_metrics_lock_poison_once("read");
                *poisoned.into_inner()
            }
        }
    }

    pub(crate) fn publish(&self, snapshot: LoopMetricsSnapshot) {
        match self.snapshot.write() {
            Ok(mut guard) => *guard = snapshot,
            Err(poisoned) => {
                warn_metrics_lock_poison_once("write");
                let mut guard = poisoned.into_inner();
                *guard = snapshot;
            }
        }
    }
}

#[derive(Debug)]
pub(crate) struct MetricsAccumulator {
    interval_start: Instant,
    interval: Duration,
    ticks: u32,
    tick_cost_sum: Duration,
    simulated: Duration,
}

impl MetricsAccumulator {
    pub(crate) fn new(interval: Duration, now: Instant) -> Self {
        Self {
            interval_start: now,
            interval,
            ticks: 0,
            tick_cost_sum: Duration::ZERO,
            simulated: Duration::ZERO,
        }
    }

    pub(crate) fn record_tick(&mut self, cost: Duration, fixed_dt: Duration) {
        self.ticks = self.ticks.saturating_add(1);
        self.tick_cost_sum = self.tick_cost_sum.saturating_add(cost);
        self.simulated = self.simulated.saturating_add(fixed_dt);
    }

    pub(crate) fn maybe_snapshot(&mut self, now: Instant) -> Option<LoopMetricsSnapshot> {
        let elapsed = now.saturating_duration_since(self.interval_start);
        if elapsed < self.interval {
            return None;
        }
        Some(self.take_snapshot(now, elapsed))
    }

    /// Flushes whatever accumulated since the last snapshot, regardless of
    /// the interval. Used once at shutdown.
    pub(crate) fn flush(&mut self, now: Instant) -> LoopMetricsSnapshot {
        let elapsed = now.saturating_duration_since(self.interval_start);
        self.take_snapshot(now, elapsed)
    }

    fn take_snapshot(&mut self, now: Instant, elapsed: Duration) -> LoopMetricsSnapshot {
        let elapsed_seconds = elapsed.as_secs_f32().max(f32::EPSILON);
        let tick_cost_ms = if self.ticks == 0 {
            0.0
        } else {
            (self.tick_cost_sum.as_secs_f32() / self.ticks as f32) * 1000.0
        };

        let snapshot = LoopMetricsSnapshot {
            tps: self.ticks as f32 / elapsed_seconds,
            tick_cost_ms,
            simulated_seconds: self.simulated.as_secs_f32(),
        };

        self.interval_start = now;
        self.ticks = 0;
        self.tick_cost_sum = Duration::ZERO;
        self.simulated = Duration::ZERO;

        snapshot
    }
}
