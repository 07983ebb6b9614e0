//! # Synchronizer: host-facing runtime for module-map synchronization.
//!
//! The [`Synchronizer`] owns the event bus, the [`RegistryStore`], and the poll loop. It
//! fans events out to subscribers, reacts to termination signals, and enforces the
//! shutdown grace period.
//!
//! ## Key responsibilities
//! - subscribe to the [`Bus`] and **fan-out** events via [`SubscriberSet`]
//! - spawn the poll loop
//! - handle OS termination signals (or a host-provided shutdown future)
//! - perform graceful shutdown with [`SyncConfig::grace`]
//!
//! ## High-level architecture
//! ```text
//! SynchronizerBuilder::build()
//!   └─► Synchronizer { bus, registry, handle, PollLoop (not started) }
//!
//! run_until(signal):
//!   - subscriber_listener(): Bus.subscribe() ─► SubscriberSet::emit(&Event)   (fire-and-forget)
//!   - tokio::spawn(PollLoop::run(stop, abort))
//!
//! Readers (any thread):
//!   registry().snapshot() ──► Arc<RegistryGeneration<H>>
//!
//! Shutdown path:
//!   signal completes / handle.stop()
//!             └─► Bus.publish(ShutdownRequested)
//!             └─► stop.cancel()        → no new cycles
//!             └─► wait_with_grace(cfg.grace):
//!                    ├─ loop exited        → Bus.publish(AllStoppedWithin)
//!                    └─ grace exceeded     → Bus.publish(GraceExceeded)
//!                                            abort.cancel() → in-flight cycle abandoned,
//!                                            nothing further committed
//! ```
//!
//! ## Example
//! ```no_run
//! use std::sync::Arc;
//! use holocron_sync::{
//!     LoadError, LoaderFn, LogWriter, ModuleDescriptor, SyncConfig, Synchronizer, Target,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let cfg = SyncConfig::new("https://cdn.example.com/module-map.json").with_root_module("frame");
//!
//!     let loader = LoaderFn::new(|d: ModuleDescriptor| async move {
//!         d.bundle(Target::Node)
//!             .map(|b| b.url.clone())
//!             .ok_or_else(|| LoadError::failed(&d.name, "no server bundle"))
//!     });
//!
//!     let sync = Synchronizer::builder(cfg, loader)
//!         .with_subscribers(vec![Arc::new(LogWriter::new())])
//!         .build()?;
//!
//!     let registry = sync.registry().clone();
//!     tokio::spawn(async move {
//!         // request handlers: one snapshot per request
//!         let generation = registry.snapshot();
//!         let _frame = generation.handle("frame");
//!     });
//!
//!     sync.run().await?;
//!     Ok(())
//! }
//! ```

use std::future::Future;
use std::sync::{Arc, Mutex};

use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::{
    builder::SynchronizerBuilder, config::SyncConfig, handle::SynchronizerHandle,
    poller::PollLoop, shutdown, state::PollStatus,
};
use crate::{
    error::RuntimeError,
    events::{Bus, Event, EventKind},
    loader::ModuleLoader,
    registry::{RegistryGeneration, RegistryStore},
    subscribers::{Subscribe, SubscriberSet},
};

/// Parts that are consumed when the synchronizer starts.
pub(super) struct Pending<L: ModuleLoader> {
    pub poll: PollLoop<L>,
    pub subscribers: Vec<Arc<dyn Subscribe>>,
}

/// Keeps a [`RegistryStore`] in sync with a remote module map.
pub struct Synchronizer<L: ModuleLoader> {
    pub(super) cfg: Arc<SyncConfig>,
    pub(super) bus: Bus,
    pub(super) registry: RegistryStore<L::Handle>,
    pub(super) handle: SynchronizerHandle,
    pub(super) abort: CancellationToken,
    pub(super) pending: Mutex<Option<Pending<L>>>,
}

impl<L: ModuleLoader> Synchronizer<L> {
    /// Starts building a synchronizer for `cfg`, loading modules with `loader`.
    pub fn builder(cfg: SyncConfig, loader: L) -> SynchronizerBuilder<L> {
        SynchronizerBuilder::new(cfg, loader)
    }

    /// Store readers take snapshots from. Clone it to hand it to request handlers.
    pub fn registry(&self) -> &RegistryStore<L::Handle> {
        &self.registry
    }

    /// Current generation; shorthand for `registry().snapshot()`.
    pub fn snapshot(&self) -> Arc<RegistryGeneration<L::Handle>> {
        self.registry.snapshot()
    }

    /// Control handle (kick, stop, status).
    pub fn handle(&self) -> SynchronizerHandle {
        self.handle.clone()
    }

    /// Current poll loop status.
    pub fn status(&self) -> PollStatus {
        self.handle.status()
    }

    /// Raw event stream. Receivers created before `run` see the first cycle.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.bus.subscribe()
    }

    /// Configuration in effect.
    pub fn config(&self) -> &SyncConfig {
        &self.cfg
    }

    /// Runs until a termination signal (SIGINT/SIGTERM/SIGQUIT or Ctrl-C) or
    /// [`SynchronizerHandle::stop`], then shuts down within the grace period.
    ///
    /// # Errors
    /// See [`run_until`](Self::run_until).
    pub async fn run(&self) -> Result<(), RuntimeError> {
        self.run_until(shutdown::termination()).await
    }

    /// Runs until `signal` completes or [`SynchronizerHandle::stop`] is called.
    ///
    /// The first poll cycle starts immediately. On shutdown no new cycle starts; an
    /// in-flight cycle may finish within [`SyncConfig::grace`].
    ///
    /// # Errors
    /// - [`RuntimeError::AlreadyRunning`] if the synchronizer was started before
    /// - [`RuntimeError::GraceExceeded`] if the in-flight cycle had to be abandoned
    pub async fn run_until<S>(&self, signal: S) -> Result<(), RuntimeError>
    where
        S: Future<Output = ()>,
    {
        let Pending { poll, subscribers } = self
            .pending
            .lock()
            .ok()
            .and_then(|mut pending| pending.take())
            .ok_or(RuntimeError::AlreadyRunning)?;

        self.subscriber_listener(subscribers);

        let stop = self.handle.stop.clone();
        let mut join = tokio::spawn(poll.run(stop.clone(), self.abort.clone()));

        tokio::select! {
            _ = signal => {
                self.handle.stop();
                self.wait_with_grace(&mut join).await
            }
            _ = stop.cancelled() => self.wait_with_grace(&mut join).await,
            res = &mut join => {
                if let Err(e) = res {
                    tracing::error!(error = %e, "poll loop terminated unexpectedly");
                }
                Ok(())
            }
        }
    }

    /// Subscribes to the bus and forwards events to the subscriber set (fire-and-forget).
    fn subscriber_listener(&self, subscribers: Vec<Arc<dyn Subscribe>>) {
        if subscribers.is_empty() {
            return;
        }
        let mut rx = self.bus.subscribe();
        let set = SubscriberSet::new(subscribers);
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(ev) => set.emit(&ev),
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "event listener lagged; events dropped");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
            set.shutdown().await;
        });
    }

    /// Waits for the poll loop to exit within the configured grace period.
    ///
    /// Publishes [`EventKind::AllStoppedWithin`] on success. Otherwise publishes
    /// [`EventKind::GraceExceeded`], abandons the in-flight cycle, and returns
    /// [`RuntimeError::GraceExceeded`].
    async fn wait_with_grace(&self, join: &mut JoinHandle<()>) -> Result<(), RuntimeError> {
        let grace = self.cfg.grace;
        match tokio::time::timeout(grace, &mut *join).await {
            Ok(_) => {
                self.bus.publish(Event::new(EventKind::AllStoppedWithin));
                Ok(())
            }
            Err(_) => {
                self.bus.publish(Event::new(EventKind::GraceExceeded));
                self.abort.cancel();
                let _ = join.await;
                Err(RuntimeError::GraceExceeded { grace })
            }
        }
    }
}

impl<L: ModuleLoader> std::fmt::Debug for Synchronizer<L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Synchronizer")
            .field("manifest_url", &self.cfg.manifest_url)
            .field("registry", &self.registry)
            .field("status", &self.status())
            .finish()
    }
}
