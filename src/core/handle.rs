//! # SynchronizerHandle: control surface for a running synchronizer.
//!
//! A cheap, cloneable handle that lets host code request an immediate poll, observe
//! the poll loop, or ask it to stop, without holding the [`Synchronizer`](crate::Synchronizer).
//!
//! ```text
//! admin endpoint ──► handle.kick()   ──► Notify ──► PollLoop wakes up early
//! health check   ──► handle.status() ──► watch::Receiver<PollStatus>
//! deploy hook    ──► handle.stop()   ──► stop token ──► no new cycles, grace wait
//! ```

use std::sync::Arc;

use tokio::sync::{Notify, watch};
use tokio_util::sync::CancellationToken;

use crate::core::state::PollStatus;
use crate::events::{Bus, Event, EventKind};

/// Cloneable control handle.
#[derive(Clone, Debug)]
pub struct SynchronizerHandle {
    pub(super) kick: Arc<Notify>,
    pub(super) stop: CancellationToken,
    pub(super) bus: Bus,
    pub(super) status: watch::Receiver<PollStatus>,
}

impl SynchronizerHandle {
    /// Requests a poll cycle now instead of waiting for the interval.
    ///
    /// Kicks during a running cycle start the next one right after it; several kicks
    /// before the loop wakes collapse into one.
    pub fn kick(&self) {
        self.bus.publish(Event::new(EventKind::KickRequested));
        self.kick.notify_one();
    }

    /// Stops the loop: no new cycle starts, the in-flight one may finish within grace.
    pub fn stop(&self) {
        if !self.stop.is_cancelled() {
            self.bus.publish(Event::new(EventKind::ShutdownRequested));
        }
        self.stop.cancel();
    }

    /// True once [`stop`](Self::stop) was called or a termination signal arrived.
    pub fn is_stopping(&self) -> bool {
        self.stop.is_cancelled()
    }

    /// Current poll loop status.
    pub fn status(&self) -> PollStatus {
        self.status.borrow().clone()
    }

    /// Receiver notified after every phase change.
    pub fn watch_status(&self) -> watch::Receiver<PollStatus> {
        self.status.clone()
    }
}
