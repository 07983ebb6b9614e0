//! # Runtime events emitted by the poll loop and the synchronizer.
//!
//! The [`EventKind`] enum classifies event types across three categories:
//! - **Cycle events**: one poll cycle's flow (starting, unchanged/changed, succeeded/failed)
//! - **Batch events**: loading and committing inside a cycle
//! - **Runtime events**: scheduling, kicks, shutdown
//!
//! The [`Event`] struct carries optional metadata such as the cycle number, module name,
//! batch index, attempt, delays, and the committed generation.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases monotonically.
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use holocron_sync::{Event, EventKind};
//!
//! let ev = Event::new(EventKind::BatchRetryScheduled)
//!     .with_cycle(7)
//!     .with_batch(2)
//!     .with_attempt(1)
//!     .with_delay(Duration::from_millis(250));
//!
//! assert_eq!(ev.kind, EventKind::BatchRetryScheduled);
//! assert_eq!(ev.delay_ms, Some(250));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::{Duration, SystemTime};

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of runtime events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Cycle events ===
    /// A poll cycle is starting (timer or kick).
    ///
    /// Sets: `cycle`, `failures` (before this cycle)
    PollStarting,

    /// The fetch reported no change.
    ///
    /// Sets: `cycle`
    ManifestUnchanged,

    /// A new module map was fetched and diffed.
    ///
    /// Sets: `cycle`, `reason` (`added=N updated=N removed=N`)
    ManifestChanged,

    /// The cycle finished without error.
    ///
    /// Sets: `cycle`, `generation` (current after the cycle)
    PollSucceeded,

    /// The cycle failed.
    ///
    /// Sets: `cycle`, `failures` (after this cycle), `reason`
    PollFailed,

    // === Batch events ===
    /// A batch attempt is starting.
    ///
    /// Sets: `cycle`, `batch` (0-based), `attempt` (1-based), `reason` (module list)
    BatchStarting,

    /// One module failed to load during a batch attempt.
    ///
    /// Sets: `cycle`, `batch`, `attempt`, `module`, `reason`
    ModuleLoadFailed,

    /// Failed members of a batch will be retried after a delay.
    ///
    /// Sets: `cycle`, `batch`, `attempt` (the one that failed), `delay_ms`
    BatchRetryScheduled,

    /// A batch exhausted its attempts; its failed members are excluded from this cycle.
    ///
    /// Sets: `cycle`, `batch`, `attempt`, `reason` (excluded module list)
    BatchExhausted,

    /// A new registry generation was published.
    ///
    /// Sets: `cycle`, `batch` (absent for removal-only commits), `generation`
    GenerationCommitted,

    // === Runtime events ===
    /// The next cycle was scheduled.
    ///
    /// Sets: `delay_ms`, `failures`
    NextPollScheduled,

    /// An immediate poll was requested through a handle.
    KickRequested,

    /// Shutdown requested (OS signal or explicit stop).
    ShutdownRequested,

    /// The loop stopped within the configured grace period.
    AllStoppedWithin,

    /// Grace period exceeded; the in-flight cycle was abandoned.
    GraceExceeded,
}

/// Runtime event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,

    /// Poll cycle number (1-based, per loop).
    pub cycle: Option<u64>,
    /// Batch index within the cycle (0-based; batch 0 holds the root module when present).
    pub batch: Option<u32>,
    /// Attempt count (starting from 1).
    pub attempt: Option<u32>,
    /// Module name, if applicable.
    pub module: Option<Arc<str>>,
    /// Delay in milliseconds (compact).
    pub delay_ms: Option<u32>,
    /// Consecutive failed cycles.
    pub failures: Option<u32>,
    /// Registry generation number.
    pub generation: Option<u64>,
    /// Human-readable reason (errors, counts, module lists).
    pub reason: Option<Arc<str>>,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            cycle: None,
            batch: None,
            attempt: None,
            module: None,
            delay_ms: None,
            failures: None,
            generation: None,
            reason: None,
        }
    }

    /// Attaches a cycle number.
    #[inline]
    pub fn with_cycle(mut self, cycle: u64) -> Self {
        self.cycle = Some(cycle);
        self
    }

    /// Attaches a batch index.
    #[inline]
    pub fn with_batch(mut self, batch: u32) -> Self {
        self.batch = Some(batch);
        self
    }

    /// Attaches an attempt count.
    #[inline]
    pub fn with_attempt(mut self, attempt: u32) -> Self {
        self.attempt = Some(attempt);
        self
    }

    /// Attaches a module name.
    #[inline]
    pub fn with_module(mut self, module: impl Into<Arc<str>>) -> Self {
        self.module = Some(module.into());
        self
    }

    /// Attaches a delay (stored as milliseconds).
    #[inline]
    pub fn with_delay(mut self, d: Duration) -> Self {
        let ms = d.as_millis().min(u128::from(u32::MAX)) as u32;
        self.delay_ms = Some(ms);
        self
    }

    /// Attaches the consecutive-failure count.
    #[inline]
    pub fn with_failures(mut self, failures: u32) -> Self {
        self.failures = Some(failures);
        self
    }

    /// Attaches a registry generation number.
    #[inline]
    pub fn with_generation(mut self, generation: u64) -> Self {
        self.generation = Some(generation);
        self
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Delay as a [`Duration`], if set.
    pub fn delay(&self) -> Option<Duration> {
        self.delay_ms.map(|ms| Duration::from_millis(u64::from(ms)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequence_is_monotonic() {
        let a = Event::new(EventKind::PollStarting);
        let b = Event::new(EventKind::PollStarting);
        assert!(b.seq > a.seq);
    }

    #[test]
    fn delay_saturates_at_u32_millis() {
        let ev = Event::new(EventKind::NextPollScheduled).with_delay(Duration::from_secs(u64::MAX));
        assert_eq!(ev.delay_ms, Some(u32::MAX));
        assert_eq!(
            Event::new(EventKind::NextPollScheduled)
                .with_delay(Duration::from_millis(1500))
                .delay(),
            Some(Duration::from_millis(1500))
        );
    }
}
