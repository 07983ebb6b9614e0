//! # PollLoop: timer-driven synchronizer loop.
//!
//! Drives poll cycles one after another:
//! - the first cycle runs immediately (eager startup fetch),
//! - later cycles start when the interval elapses or a kick arrives,
//! - the interval follows [`BackoffPolicy`](crate::BackoffPolicy) on failure,
//! - cooperative shutdown via two [`CancellationToken`]s (stop, abort).
//!
//! ## Event flow
//! For each cycle, the loop publishes:
//! ```text
//! PollStarting → [cycle] → PollSucceeded (changed or unchanged)
//!                        → PollFailed    (fetch, load, or commit error)
//!
//! then:
//!   → NextPollScheduled → [sleep | kick | stop]
//! ```
//!
//! ## Architecture
//! ```text
//! Synchronizer ──► tokio::spawn(PollLoop::run(stop, abort))
//!
//! loop {
//!   ├─► stop requested? → break
//!   ├─► publish PollStarting, metrics.poll_attempted()
//!   ├─► Cycle::run() ──► fetch / diff / load / commit
//!   │       ▼
//!   │     Ok  ──► failures = 0, interval = base, record token
//!   │     Err ──► failures += 1, interval = backoff.next(failures)
//!   │     Abandoned ──► break
//!   ├─► publish NextPollScheduled, metrics.set_poll_wait(interval)
//!   └─► select! { sleep(interval) | kick | stop }
//! }
//! ```
//!
//! ## Rules
//! - Cycles run **sequentially** (never two at once).
//! - The stop token is only checked **between** cycles; the abort token interrupts one.
//! - A kick that arrives during a cycle starts the next cycle right after it.

use std::sync::Arc;

use tokio::{
    select,
    sync::{Notify, watch},
    time,
};
use tokio_util::sync::CancellationToken;

use crate::{
    core::{
        config::SyncConfig,
        cycle::{Cycle, CycleOutcome},
        state::{PollPhase, PollState, PollStatus},
    },
    error::CycleError,
    events::{Bus, Event, EventKind},
    loader::ModuleLoader,
    manifest::ManifestFetcher,
    metrics::MetricsSink,
    registry::RegistryStore,
};

/// Owns the poll state and runs cycles until stopped.
pub(crate) struct PollLoop<L: ModuleLoader> {
    pub cfg: Arc<SyncConfig>,
    pub fetcher: Arc<dyn ManifestFetcher>,
    pub loader: Arc<L>,
    pub registry: RegistryStore<L::Handle>,
    pub metrics: Arc<dyn MetricsSink>,
    pub bus: Bus,
    pub status: watch::Sender<PollStatus>,
    pub kick: Arc<Notify>,
}

impl<L: ModuleLoader> PollLoop<L> {
    /// Runs the loop until `stop` is cancelled between cycles or `abort` interrupts one.
    ///
    /// ### Cancellation semantics
    /// - `stop` prevents new cycles and wakes the idle wait immediately
    /// - an in-flight cycle keeps running after `stop`
    /// - `abort` makes the in-flight cycle give up at its next suspension point;
    ///   nothing is committed after that
    pub async fn run(self, stop: CancellationToken, abort: CancellationToken) {
        let base = self.cfg.backoff.base;
        let mut state = PollState::new(base);

        loop {
            if stop.is_cancelled() || abort.is_cancelled() {
                break;
            }

            state.cycle += 1;
            let n = state.cycle;
            self.metrics.poll_attempted();
            self.bus.publish(
                Event::new(EventKind::PollStarting)
                    .with_cycle(n)
                    .with_failures(state.consecutive_failures),
            );

            let res = Cycle {
                cfg: &self.cfg,
                fetcher: self.fetcher.as_ref(),
                loader: self.loader.as_ref(),
                registry: &self.registry,
                metrics: self.metrics.as_ref(),
                bus: &self.bus,
                status: &self.status,
                abort: &abort,
                state: &mut state,
            }
            .run()
            .await;

            match res {
                Ok(outcome) => {
                    let token = match outcome {
                        CycleOutcome::Unchanged => None,
                        CycleOutcome::Applied { token, .. } => token,
                    };
                    state.succeeded(token, base);
                    self.metrics.poll_succeeded();
                    self.metrics.set_consecutive_failures(0);
                    self.bus.publish(
                        Event::new(EventKind::PollSucceeded)
                            .with_cycle(n)
                            .with_generation(self.registry.snapshot().number()),
                    );
                }
                Err(CycleError::Abandoned) => break,
                Err(e) => {
                    state.phase = PollPhase::Backoff;
                    state.failed(e.as_label());
                    state.interval = self.cfg.backoff.next(state.consecutive_failures);
                    self.metrics.poll_failed();
                    self.metrics.set_consecutive_failures(state.consecutive_failures);
                    self.bus.publish(
                        Event::new(EventKind::PollFailed)
                            .with_cycle(n)
                            .with_failures(state.consecutive_failures)
                            .with_reason(format!("{}: {e}", e.as_label())),
                    );
                }
            }

            self.enter(&mut state, PollPhase::SchedulingNext);
            let wait = state.interval;
            self.metrics.set_poll_wait(wait);
            self.bus.publish(
                Event::new(EventKind::NextPollScheduled)
                    .with_delay(wait)
                    .with_failures(state.consecutive_failures),
            );

            self.enter(&mut state, PollPhase::Idle);
            let sleep = time::sleep(wait);
            tokio::pin!(sleep);
            select! {
                biased;
                _ = stop.cancelled() => break,
                _ = self.kick.notified() => {}
                _ = &mut sleep => {}
            }
        }

        self.enter(&mut state, PollPhase::Stopped);
    }

    fn enter(&self, state: &mut PollState, phase: PollPhase) {
        state.phase = phase;
        self.status
            .send_replace(state.status(self.registry.snapshot().number()));
    }
}
