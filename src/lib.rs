//! # holocron-sync
//!
//! **holocron-sync** keeps a server-side rendering host in step with a remote module map.
//!
//! It periodically fetches the map of independently deployed frontend modules, loads
//! what changed in bounded root-first batches, and publishes the result as an immutable
//! registry generation that any number of request handlers can read concurrently.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!        module-map.json (CDN)
//!               │  GET, If-None-Match
//!               ▼
//!     ┌───────────────────┐
//!     │  ManifestFetcher  │  ETag / content hash, deadline
//!     └─────────┬─────────┘
//!               ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  PollLoop (spawned by Synchronizer)                               │
//! │  - diff_against_generation (added / updated / removed)            │
//! │  - batch (root first and alone, then groups of batch_size)        │
//! │  - ModuleLoader::load (concurrent per batch, retried per batch)   │
//! │  - RegistryStore::commit (one generation per batch)               │
//! │  - BackoffPolicy (min(base × 2^failures, max) ± jitter)           │
//! └──────┬──────────────────────────┬─────────────────────────┬───────┘
//!        │ commit                   │ publish(Event)          │ counters
//!        ▼                          ▼                         ▼
//! ┌──────────────────┐   ┌────────────────────────┐   ┌──────────────┐
//! │  RegistryStore   │   │ Bus (broadcast channel)│   │ MetricsSink  │
//! │ Arc<Generation>  │   └───────────┬────────────┘   └──────────────┘
//! └────────┬─────────┘               ▼
//!          │ snapshot()      subscriber_listener
//!          ▼                         ▼
//!   request handlers          SubscriberSet ──► LogWriter, custom subscribers
//! ```
//!
//! ### Cycle
//! ```text
//! Idle ──(timer | kick)──► Fetching
//!   ├─ Unchanged ────────────────────────────────► failures = 0, interval = base
//!   ├─ Changed(map) ─► Diffing ─► Loading ⇄ Committing
//!   │                    ├─ all loaded ──────────► record token, failures = 0
//!   │                    └─ some excluded ───────► committed batches kept, cycle failed
//!   └─ Err ──────────────────────────────────────► failures += 1
//!                                                  interval = backoff.next(failures)
//! ```
//!
//! ## Features
//! | Area              | Description                                                     | Key types / traits                                  |
//! |-------------------|-----------------------------------------------------------------|-----------------------------------------------------|
//! | **Runtime**       | Poll loop lifecycle, kicks, graceful shutdown.                  | [`Synchronizer`], [`SynchronizerHandle`]            |
//! | **Registry**      | Copy-on-write generations with lock-free-feeling reads.         | [`RegistryStore`], [`RegistryGeneration`]           |
//! | **Module map**    | Parsing, conditional fetching, diffing.                         | [`ModuleMap`], [`ManifestFetcher`], [`diff`]        |
//! | **Loading**       | Pluggable module loading.                                       | [`ModuleLoader`], [`LoaderFn`]                      |
//! | **Policies**      | Poll backoff, jitter, per-batch retry.                          | [`BackoffPolicy`], [`JitterPolicy`], [`RetryPolicy`]|
//! | **Observability** | Lifecycle events, subscribers, metrics boundary.                | [`Subscribe`], [`LogWriter`], [`MetricsSink`]       |
//! | **Errors**        | Typed errors with stable labels.                                | [`FetchError`], [`LoadError`], [`RuntimeError`]     |
//! | **Configuration** | Centralized settings.                                           | [`SyncConfig`]                                      |
//!
//! ## Example
//! ```no_run
//! use std::sync::Arc;
//! use holocron_sync::{
//!     CounterMetrics, LoadError, LoaderFn, LogWriter, ModuleDescriptor, SyncConfig, Synchronizer,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let cfg = SyncConfig::new("https://cdn.example.com/module-map.json").with_root_module("frame");
//!     let metrics = Arc::new(CounterMetrics::new());
//!
//!     let sync = Synchronizer::builder(
//!         cfg,
//!         LoaderFn::new(|d: ModuleDescriptor| async move { Ok::<_, LoadError>(d) }),
//!     )
//!     .with_metrics(metrics.clone())
//!     .with_subscribers(vec![Arc::new(LogWriter::new())])
//!     .build()?;
//!
//!     let handle = sync.handle();
//!     tokio::spawn(async move {
//!         tokio::time::sleep(std::time::Duration::from_secs(300)).await;
//!         handle.stop();
//!     });
//!
//!     sync.run().await?;
//!     println!("{:?}", metrics.snapshot());
//!     Ok(())
//! }
//! ```

mod core;
mod error;
mod events;
mod loader;
mod manifest;
mod metrics;
mod policies;
mod registry;
mod schedule;
mod subscribers;

// ---- Public re-exports ----

pub use core::{PollPhase, PollStatus, SyncConfig, Synchronizer, SynchronizerBuilder, SynchronizerHandle};
pub use error::{CommitError, ConfigError, CycleError, FetchError, LoadError, RuntimeError};
pub use events::{Bus, Event, EventKind};
pub use loader::{LoaderFn, ModuleLoader};
pub use manifest::{
    BundleRef, FetchOutcome, FreshnessToken, HttpManifestFetcher, ManifestDiff, ManifestFetcher,
    ModuleDescriptor, ModuleMap, ParseError, Target, diff, diff_against_generation,
};
pub use metrics::{CounterMetrics, MetricsSink, MetricsSnapshot, NoopMetrics};
pub use policies::{BackoffPolicy, JitterPolicy, RetryPolicy, next_interval};
pub use registry::{LoadedModule, RegistryGeneration, RegistryStore};
pub use schedule::{DEFAULT_BATCH_SIZE, batch};
pub use subscribers::{LogWriter, Subscribe, SubscriberSet};
