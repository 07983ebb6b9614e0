//! # LogWriter: renders events through `tracing`
//!
//! A subscriber that turns every [`Event`] into one structured `tracing` record.
//! Install any `tracing` subscriber in the host to see them.
//!
//! ## Example output (fmt subscriber)
//! ```text
//! INFO  poll starting cycle=1 failures=0
//! INFO  module map changed cycle=1 diff="added=3 updated=0 removed=0"
//! WARN  module load failed cycle=1 batch=1 attempt=1 module="nav" reason="..."
//! INFO  generation committed cycle=1 batch=0 generation=1
//! WARN  poll failed cycle=2 failures=1 reason="fetch_http_status: ..."
//! DEBUG next poll scheduled delay_ms=10000 failures=1
//! ```

use async_trait::async_trait;
use tracing::{debug, error, info, warn};

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

/// Event writer subscriber.
#[derive(Default, Debug, Clone, Copy)]
pub struct LogWriter;

impl LogWriter {
    /// Construct a new [`LogWriter`].
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        let reason = e.reason.as_deref().unwrap_or("");
        let module = e.module.as_deref().unwrap_or("");
        match e.kind {
            EventKind::PollStarting => {
                info!(cycle = e.cycle, failures = e.failures, "poll starting");
            }
            EventKind::ManifestUnchanged => {
                debug!(cycle = e.cycle, "module map unchanged");
            }
            EventKind::ManifestChanged => {
                info!(cycle = e.cycle, diff = reason, "module map changed");
            }
            EventKind::PollSucceeded => {
                info!(cycle = e.cycle, generation = e.generation, "poll succeeded");
            }
            EventKind::PollFailed => {
                warn!(cycle = e.cycle, failures = e.failures, reason, "poll failed");
            }
            EventKind::BatchStarting => {
                debug!(
                    cycle = e.cycle,
                    batch = e.batch,
                    attempt = e.attempt,
                    modules = reason,
                    "batch starting"
                );
            }
            EventKind::ModuleLoadFailed => {
                warn!(
                    cycle = e.cycle,
                    batch = e.batch,
                    attempt = e.attempt,
                    module,
                    reason,
                    "module load failed"
                );
            }
            EventKind::BatchRetryScheduled => {
                info!(
                    cycle = e.cycle,
                    batch = e.batch,
                    after_attempt = e.attempt,
                    delay_ms = e.delay_ms,
                    "batch retry scheduled"
                );
            }
            EventKind::BatchExhausted => {
                error!(
                    cycle = e.cycle,
                    batch = e.batch,
                    attempts = e.attempt,
                    excluded = reason,
                    "batch attempts exhausted"
                );
            }
            EventKind::GenerationCommitted => {
                info!(
                    cycle = e.cycle,
                    batch = e.batch,
                    generation = e.generation,
                    "generation committed"
                );
            }
            EventKind::NextPollScheduled => {
                debug!(delay_ms = e.delay_ms, failures = e.failures, "next poll scheduled");
            }
            EventKind::KickRequested => {
                debug!("immediate poll requested");
            }
            EventKind::ShutdownRequested => {
                info!("shutdown requested");
            }
            EventKind::AllStoppedWithin => {
                info!("poll loop stopped within grace");
            }
            EventKind::GraceExceeded => {
                warn!("grace exceeded; in-flight cycle abandoned");
            }
        }
    }

    fn name(&self) -> &'static str {
        "LogWriter"
    }
}
