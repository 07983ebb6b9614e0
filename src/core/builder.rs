use std::sync::{Arc, Mutex};

use tokio::sync::{Notify, watch};
use tokio_util::sync::CancellationToken;

use super::{
    config::SyncConfig,
    handle::SynchronizerHandle,
    poller::PollLoop,
    state::PollStatus,
    synchronizer::{Pending, Synchronizer},
};
use crate::{
    error::RuntimeError,
    events::Bus,
    loader::ModuleLoader,
    manifest::{HttpManifestFetcher, ManifestFetcher},
    metrics::{MetricsSink, NoopMetrics},
    registry::RegistryStore,
    subscribers::Subscribe,
};

/// Builder for a [`Synchronizer`] with optional collaborators.
///
/// Only the configuration and the loader are required; everything else has a default:
/// - fetcher: [`HttpManifestFetcher`] with `cfg.fetch_timeout`
/// - metrics: [`NoopMetrics`]
/// - subscribers: none
/// - registry: a fresh, empty [`RegistryStore`]
pub struct SynchronizerBuilder<L: ModuleLoader> {
    cfg: SyncConfig,
    loader: Arc<L>,
    fetcher: Option<Arc<dyn ManifestFetcher>>,
    metrics: Arc<dyn MetricsSink>,
    subscribers: Vec<Arc<dyn Subscribe>>,
    registry: Option<RegistryStore<L::Handle>>,
}

impl<L: ModuleLoader> SynchronizerBuilder<L> {
    /// Creates a new builder with the given configuration and loader.
    pub fn new(cfg: SyncConfig, loader: L) -> Self {
        Self {
            cfg,
            loader: Arc::new(loader),
            fetcher: None,
            metrics: Arc::new(NoopMetrics),
            subscribers: Vec::new(),
            registry: None,
        }
    }

    /// Replaces the HTTP fetcher (custom transport, tests).
    pub fn with_fetcher(mut self, fetcher: impl ManifestFetcher) -> Self {
        self.fetcher = Some(Arc::new(fetcher));
        self
    }

    /// Sets the metrics sink. Keep a clone of the `Arc` to read in-process counters.
    pub fn with_metrics(mut self, metrics: Arc<dyn MetricsSink>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Sets event subscribers for observability.
    ///
    /// Subscribers receive runtime events (cycles, batches, commits, shutdown)
    /// through dedicated workers with bounded queues.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Publishes into an existing store instead of a fresh one.
    pub fn with_registry(mut self, registry: RegistryStore<L::Handle>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Validates the configuration and assembles the synchronizer.
    ///
    /// Nothing is spawned here; the poll loop and subscriber workers start in
    /// [`Synchronizer::run`] / [`Synchronizer::run_until`].
    ///
    /// # Errors
    /// - [`RuntimeError::Config`] if [`SyncConfig::validate`] rejects the configuration
    /// - [`RuntimeError::HttpClient`] if the default HTTP client cannot be built
    pub fn build(self) -> Result<Synchronizer<L>, RuntimeError> {
        self.cfg.validate()?;

        let fetcher: Arc<dyn ManifestFetcher> = match self.fetcher {
            Some(f) => f,
            None => Arc::new(HttpManifestFetcher::new(self.cfg.fetch_timeout_opt())?),
        };
        let cfg = Arc::new(self.cfg);
        let bus = Bus::new(cfg.bus_capacity_clamped());
        let registry = self.registry.unwrap_or_default();
        let kick = Arc::new(Notify::new());
        let (status_tx, status_rx) = watch::channel(PollStatus {
            interval: cfg.backoff.base,
            generation: registry.snapshot().number(),
            ..PollStatus::default()
        });

        let handle = SynchronizerHandle {
            kick: Arc::clone(&kick),
            stop: CancellationToken::new(),
            bus: bus.clone(),
            status: status_rx,
        };
        let poll = PollLoop {
            cfg: Arc::clone(&cfg),
            fetcher,
            loader: self.loader,
            registry: registry.clone(),
            metrics: self.metrics,
            bus: bus.clone(),
            status: status_tx,
            kick,
        };

        Ok(Synchronizer {
            cfg,
            bus,
            registry,
            handle,
            abort: CancellationToken::new(),
            pending: Mutex::new(Some(Pending {
                poll,
                subscribers: self.subscribers,
            })),
        })
    }
}
