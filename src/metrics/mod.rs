//! # Metrics boundary.
//!
//! The poll loop drives a [`MetricsSink`]; how the numbers are exported (Prometheus,
//! StatsD, logs) is the host's business.
//!
//! ## Calls per cycle
//! ```text
//! cycle start          ──► poll_attempted()
//! cycle ok / unchanged ──► poll_succeeded(), set_consecutive_failures(0)
//! cycle failed         ──► poll_failed(),    set_consecutive_failures(n)
//! module given up on   ──► module_load_failed(name)
//! next cycle scheduled ──► set_poll_wait(interval)
//! ```

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::Duration;

/// Counters and gauges incremented by the poll loop.
///
/// Every method has a no-op default so hosts implement only what they export.
pub trait MetricsSink: Send + Sync + 'static {
    /// A poll cycle started.
    fn poll_attempted(&self) {}

    /// A poll cycle finished without error (changed or unchanged).
    fn poll_succeeded(&self) {}

    /// A poll cycle failed (fetch, load, or commit).
    fn poll_failed(&self) {}

    /// Gauge: back-to-back failed cycles (`0` after any success).
    fn set_consecutive_failures(&self, _count: u32) {}

    /// Gauge: wait before the next cycle.
    fn set_poll_wait(&self, _wait: Duration) {}

    /// A module was excluded from a cycle after exhausting its batch attempts.
    fn module_load_failed(&self, _module: &str) {}
}

/// Sink that drops everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopMetrics;

impl MetricsSink for NoopMetrics {}

/// In-process atomic counters; handy for health endpoints and tests.
#[derive(Debug, Default)]
pub struct CounterMetrics {
    attempted: AtomicU64,
    succeeded: AtomicU64,
    failed: AtomicU64,
    load_failures: AtomicU64,
    consecutive_failures: AtomicU32,
    poll_wait_ms: AtomicU64,
}

/// Point-in-time copy of [`CounterMetrics`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MetricsSnapshot {
    /// Cycles started.
    pub attempted: u64,
    /// Cycles that succeeded.
    pub succeeded: u64,
    /// Cycles that failed.
    pub failed: u64,
    /// Modules given up on, summed over all cycles.
    pub load_failures: u64,
    /// Current consecutive-failure gauge.
    pub consecutive_failures: u32,
    /// Current poll-wait gauge in milliseconds.
    pub poll_wait_ms: u64,
}

impl CounterMetrics {
    /// Creates zeroed counters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads all counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            attempted: self.attempted.load(Ordering::Relaxed),
            succeeded: self.succeeded.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            load_failures: self.load_failures.load(Ordering::Relaxed),
            consecutive_failures: self.consecutive_failures.load(Ordering::Relaxed),
            poll_wait_ms: self.poll_wait_ms.load(Ordering::Relaxed),
        }
    }
}

impl MetricsSink for CounterMetrics {
    fn poll_attempted(&self) {
        self.attempted.fetch_add(1, Ordering::Relaxed);
    }

    fn poll_succeeded(&self) {
        self.succeeded.fetch_add(1, Ordering::Relaxed);
    }

    fn poll_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    fn set_consecutive_failures(&self, count: u32) {
        self.consecutive_failures.store(count, Ordering::Relaxed);
    }

    fn set_poll_wait(&self, wait: Duration) {
        let ms = wait.as_millis().min(u128::from(u64::MAX)) as u64;
        self.poll_wait_ms.store(ms, Ordering::Relaxed);
    }

    fn module_load_failed(&self, _module: &str) {
        self.load_failures.fetch_add(1, Ordering::Relaxed);
    }
}
