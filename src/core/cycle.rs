//! # Run a single poll cycle.
//!
//! Executes one cycle of the synchronizer: fetch the module map, diff it against the
//! current registry generation, load what changed in root-first batches, and commit one
//! generation per batch. Lifecycle events go to the [`Bus`].
//!
//! ## Flow
//! ```text
//! fetch(url, last_token)
//!   ├─► Unchanged ──────────────────────────────────────────► Ok(Unchanged)
//!   └─► Changed(map)
//!         └─► diff_against_generation(snapshot, map)
//!               └─► batch(added ∪ updated, root, size)
//!                     for each batch:
//!                       attempt 1..=max_attempts:
//!                         join_all(load(member))  (only members still failing)
//!                         all loaded? ──► break
//!                         else        ──► sleep(retry delay)
//!                       commit(loaded, removed if last batch, token)
//!               └─► no batches but removals ──► commit([], removed, token)
//!   any excluded module ──► Err(Load), committed batches stay committed
//! ```
//!
//! ## Rules
//! - Loads inside a batch run concurrently; batches run and commit in order.
//! - Only members that failed are re-loaded on a retry.
//! - The abort token is observed at every suspension point; once it fires, no further
//!   commit happens and the cycle returns [`CycleError::Abandoned`].
//! - The registry is never told about fetch or load errors.

use std::future::Future;
use std::sync::Arc;

use futures::future::join_all;
use tokio::{sync::watch, time};
use tokio_util::sync::CancellationToken;

use crate::{
    core::{
        config::SyncConfig,
        state::{PollPhase, PollState, PollStatus},
    },
    error::{CycleError, LoadError},
    events::{Bus, Event, EventKind},
    loader::ModuleLoader,
    manifest::{
        FetchOutcome, FreshnessToken, ManifestDiff, ManifestFetcher, ModuleDescriptor, ModuleMap,
        diff_against_generation,
    },
    metrics::MetricsSink,
    registry::{LoadedModule, RegistryStore},
    schedule::batch,
};

/// What a cycle that did not fail achieved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum CycleOutcome {
    /// The module map did not change.
    Unchanged,
    /// The module map changed and every module loaded.
    Applied {
        /// Token of the applied map.
        token: Option<FreshnessToken>,
        /// Generations published by this cycle.
        commits: u32,
    },
}

/// Collaborators of a cycle, borrowed from the poll loop.
pub(crate) struct Cycle<'a, L: ModuleLoader> {
    pub cfg: &'a SyncConfig,
    pub fetcher: &'a dyn ManifestFetcher,
    pub loader: &'a L,
    pub registry: &'a RegistryStore<L::Handle>,
    pub metrics: &'a dyn MetricsSink,
    pub bus: &'a Bus,
    pub status: &'a watch::Sender<PollStatus>,
    pub abort: &'a CancellationToken,
    pub state: &'a mut PollState,
}

impl<L: ModuleLoader> Cycle<'_, L> {
    /// Runs cycle number `state.cycle` to completion (or abandonment).
    pub async fn run(mut self) -> Result<CycleOutcome, CycleError> {
        let n = self.state.cycle;

        self.enter(PollPhase::Fetching);
        let fetch = self
            .fetcher
            .fetch(&self.cfg.manifest_url, self.state.last_token.as_ref());
        let fetched = self.or_abort(fetch).await??;
        let map = match fetched {
            FetchOutcome::Unchanged => {
                self.enter(PollPhase::Unchanged);
                self.bus
                    .publish(Event::new(EventKind::ManifestUnchanged).with_cycle(n));
                return Ok(CycleOutcome::Unchanged);
            }
            FetchOutcome::Changed(map) => map,
        };

        self.enter(PollPhase::Diffing);
        let diff = diff_against_generation(&self.registry.snapshot(), &map);
        self.bus.publish(
            Event::new(EventKind::ManifestChanged)
                .with_cycle(n)
                .with_reason(summary(&diff)),
        );

        let (commits, failed) = self.apply(&map, &diff).await?;
        if failed.is_empty() {
            Ok(CycleOutcome::Applied {
                token: map.token().cloned(),
                commits,
            })
        } else {
            Err(CycleError::Load { failed })
        }
    }

    /// Loads and commits every batch; returns the number of commits and the modules given up on.
    async fn apply(
        &mut self,
        map: &Arc<ModuleMap>,
        diff: &ManifestDiff,
    ) -> Result<(u32, Vec<LoadError>), CycleError> {
        let token = map.token().cloned();
        let groups = batch(
            diff.to_load(),
            self.cfg.root_module.as_deref(),
            self.cfg.batch_size_clamped(),
        );

        let removed_all = removals(diff);
        let mut commits = 0;
        let mut failed = Vec::new();
        let last = groups.len().saturating_sub(1);

        for (idx, names) in groups.iter().enumerate() {
            let members: Vec<&ModuleDescriptor> =
                names.iter().filter_map(|name| map.get(name)).collect();

            self.enter(PollPhase::Loading);
            let (loaded, mut errors) = self.load_batch(idx as u32, members).await?;
            failed.append(&mut errors);

            let removed: &[String] = if idx == last { &removed_all } else { &[] };
            if loaded.is_empty() && removed.is_empty() {
                continue;
            }
            self.commit(Some(idx as u32), loaded, removed, token.clone())?;
            commits += 1;
        }

        if groups.is_empty() && !diff.removed.is_empty() {
            self.commit(None, Vec::new(), &removed_all, token)?;
            commits += 1;
        }

        Ok((commits, failed))
    }

    /// Loads one batch, retrying failed members per the batch retry policy.
    ///
    /// Returns the loaded modules and, after exhaustion, the final error of every member
    /// that never loaded.
    async fn load_batch(
        &self,
        idx: u32,
        members: Vec<&ModuleDescriptor>,
    ) -> Result<(Vec<LoadedModule<L::Handle>>, Vec<LoadError>), CycleError> {
        let n = self.state.cycle;
        let retry = self.cfg.batch_retry;
        let mut pending = members;
        let mut loaded = Vec::with_capacity(pending.len());
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;
            self.bus.publish(
                Event::new(EventKind::BatchStarting)
                    .with_cycle(n)
                    .with_batch(idx)
                    .with_attempt(attempt)
                    .with_reason(join_names(pending.iter().map(|d| d.name.as_str()))),
            );

            let results = join_all(pending.iter().map(|d| self.load_one(d))).await;
            if self.abort.is_cancelled() {
                return Err(CycleError::Abandoned);
            }

            let mut still_failing = Vec::new();
            let mut errors = Vec::new();
            for (desc, res) in pending.into_iter().zip(results) {
                match res {
                    Ok(handle) => loaded.push(LoadedModule::new(desc.clone(), handle)),
                    Err(e) => {
                        self.bus.publish(
                            Event::new(EventKind::ModuleLoadFailed)
                                .with_cycle(n)
                                .with_batch(idx)
                                .with_attempt(attempt)
                                .with_module(desc.name.as_str())
                                .with_reason(e.to_string()),
                        );
                        still_failing.push(desc);
                        errors.push(e);
                    }
                }
            }

            if still_failing.is_empty() {
                return Ok((loaded, Vec::new()));
            }

            match retry.delay_after(attempt) {
                Some(delay) => {
                    self.bus.publish(
                        Event::new(EventKind::BatchRetryScheduled)
                            .with_cycle(n)
                            .with_batch(idx)
                            .with_attempt(attempt)
                            .with_delay(delay),
                    );
                    self.or_abort(time::sleep(delay)).await?;
                    pending = still_failing;
                }
                None => {
                    self.bus.publish(
                        Event::new(EventKind::BatchExhausted)
                            .with_cycle(n)
                            .with_batch(idx)
                            .with_attempt(attempt)
                            .with_reason(join_names(still_failing.iter().map(|d| d.name.as_str()))),
                    );
                    for e in &errors {
                        self.metrics.module_load_failed(e.module());
                    }
                    return Ok((loaded, errors));
                }
            }
        }
    }

    /// Loads one module under the configured deadline; gives up immediately on abort.
    async fn load_one(&self, desc: &ModuleDescriptor) -> Result<L::Handle, LoadError> {
        let load = async {
            match self.cfg.load_timeout_opt() {
                Some(dur) => match time::timeout(dur, self.loader.load(desc)).await {
                    Ok(res) => res,
                    Err(_elapsed) => Err(LoadError::Timeout {
                        module: desc.name.clone(),
                        timeout: dur,
                    }),
                },
                None => self.loader.load(desc).await,
            }
        };

        tokio::select! {
            biased;
            _ = self.abort.cancelled() => Err(LoadError::Canceled { module: desc.name.clone() }),
            res = load => res,
        }
    }

    /// Publishes a generation unless the cycle has been abandoned.
    fn commit(
        &mut self,
        idx: Option<u32>,
        loaded: Vec<LoadedModule<L::Handle>>,
        removed: &[String],
        token: Option<FreshnessToken>,
    ) -> Result<(), CycleError> {
        if self.abort.is_cancelled() {
            return Err(CycleError::Abandoned);
        }
        self.enter(PollPhase::Committing);
        let generation = self.registry.commit(loaded, removed, token)?;

        let mut ev = Event::new(EventKind::GenerationCommitted)
            .with_cycle(self.state.cycle)
            .with_generation(generation.number());
        if let Some(idx) = idx {
            ev = ev.with_batch(idx);
        }
        self.bus.publish(ev);
        Ok(())
    }

    /// Awaits `fut` unless the abort token fires first.
    async fn or_abort<T>(&self, fut: impl Future<Output = T>) -> Result<T, CycleError> {
        tokio::select! {
            biased;
            _ = self.abort.cancelled() => Err(CycleError::Abandoned),
            v = fut => Ok(v),
        }
    }

    fn enter(&mut self, phase: PollPhase) {
        self.state.phase = phase;
        self.status
            .send_replace(self.state.status(self.registry.snapshot().number()));
    }
}

fn removals(diff: &ManifestDiff) -> Vec<String> {
    diff.removed.iter().cloned().collect()
}

fn summary(diff: &ManifestDiff) -> String {
    format!(
        "added={} updated={} removed={}",
        diff.added.len(),
        diff.updated.len(),
        diff.removed.len()
    )
}

fn join_names<'a>(names: impl Iterator<Item = &'a str>) -> String {
    names.collect::<Vec<_>>().join(",")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FetchError;
    use crate::loader::LoaderFn;
    use crate::manifest::Target;
    use crate::metrics::{CounterMetrics, NoopMetrics};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    struct Scripted(Mutex<Vec<Result<FetchOutcome, FetchError>>>);

    impl Scripted {
        fn new(mut steps: Vec<Result<FetchOutcome, FetchError>>) -> Self {
            steps.reverse();
            Self(Mutex::new(steps))
        }
    }

    #[async_trait]
    impl ManifestFetcher for Scripted {
        async fn fetch(
            &self,
            _url: &str,
            _previous: Option<&FreshnessToken>,
        ) -> Result<FetchOutcome, FetchError> {
            self.0
                .lock()
                .unwrap()
                .pop()
                .unwrap_or(Ok(FetchOutcome::Unchanged))
        }
    }

    fn module(name: &str, version: &str) -> ModuleDescriptor {
        ModuleDescriptor::new(name, version).with_bundle(
            Target::Node,
            format!("https://cdn/{name}/{version}.js"),
            format!("sha-{name}-{version}"),
        )
    }

    fn changed(tag: &str, mods: Vec<ModuleDescriptor>) -> Result<FetchOutcome, FetchError> {
        let map = ModuleMap::from_descriptors(mods, Some(FreshnessToken::etag(tag))).unwrap();
        Ok(FetchOutcome::Changed(Arc::new(map)))
    }

    struct Harness {
        cfg: SyncConfig,
        bus: Bus,
        status: watch::Sender<PollStatus>,
        abort: CancellationToken,
        state: PollState,
    }

    impl Harness {
        fn new() -> Self {
            let mut cfg = SyncConfig::new("https://cdn/module-map.json").with_root_module("root");
            cfg.batch_retry.backoff = cfg.batch_retry.backoff.without_jitter();
            let state = PollState::new(cfg.backoff.base);
            Self {
                cfg,
                bus: Bus::new(256),
                status: watch::channel(PollStatus::default()).0,
                abort: CancellationToken::new(),
                state,
            }
        }

        async fn run<L: ModuleLoader>(
            &mut self,
            fetcher: &dyn ManifestFetcher,
            loader: &L,
            registry: &RegistryStore<L::Handle>,
            metrics: &dyn MetricsSink,
        ) -> Result<CycleOutcome, CycleError> {
            self.state.cycle += 1;
            let res = Cycle {
                cfg: &self.cfg,
                fetcher,
                loader,
                registry,
                metrics,
                bus: &self.bus,
                status: &self.status,
                abort: &self.abort,
                state: &mut self.state,
            }
            .run()
            .await;
            if let Ok(CycleOutcome::Applied { token, .. }) = &res {
                self.state.last_token = token.clone();
            }
            res
        }
    }

    fn echo_loader() -> LoaderFn<impl Fn(ModuleDescriptor) -> futures::future::Ready<Result<String, LoadError>> + Send + Sync + 'static> {
        LoaderFn::new(|d: ModuleDescriptor| futures::future::ready(Ok(format!("{}@{}", d.name, d.version))))
    }

    #[tokio::test]
    async fn v1_then_v2_updates_and_removes() {
        let mut h = Harness::new();
        let registry = RegistryStore::new();
        let fetcher = Scripted::new(vec![
            changed("\"v1\"", vec![module("root", "1"), module("a", "1"), module("b", "1")]),
            changed("\"v2\"", vec![module("root", "1"), module("a", "2")]),
        ]);
        let loader = echo_loader();

        let first = h.run(&fetcher, &loader, &registry, &NoopMetrics).await.unwrap();
        // root alone, then [a, b]
        assert_eq!(
            first,
            CycleOutcome::Applied { token: Some(FreshnessToken::etag("\"v1\"")), commits: 2 }
        );
        assert_eq!(registry.snapshot().module_names(), vec!["a", "b", "root"]);

        let second = h.run(&fetcher, &loader, &registry, &NoopMetrics).await.unwrap();
        assert_eq!(
            second,
            CycleOutcome::Applied { token: Some(FreshnessToken::etag("\"v2\"")), commits: 1 }
        );
        let g = registry.snapshot();
        assert_eq!(g.module_names(), vec!["a", "root"]);
        assert_eq!(g.handle("a").map(String::as_str), Some("a@2"));
        assert_eq!(g.token(), Some(&FreshnessToken::etag("\"v2\"")));

        assert_eq!(
            h.run(&fetcher, &loader, &registry, &NoopMetrics).await.unwrap(),
            CycleOutcome::Unchanged
        );
        assert_eq!(registry.snapshot().number(), g.number());
    }

    #[tokio::test]
    async fn root_generation_is_published_before_dependents() {
        let mut h = Harness::new();
        let registry: RegistryStore<String> = RegistryStore::new();
        let fetcher = Scripted::new(vec![changed(
            "\"v1\"",
            vec![module("a", "1"), module("root", "1"), module("z", "1")],
        )]);

        let seen = Arc::new(Mutex::new(Vec::new()));
        let loader = {
            let registry = registry.clone();
            let seen = Arc::clone(&seen);
            LoaderFn::new(move |d: ModuleDescriptor| {
                if d.name != "root" {
                    seen.lock().unwrap().push(registry.snapshot().contains("root"));
                }
                futures::future::ready(Ok::<_, LoadError>(d.name))
            })
        };

        h.run(&fetcher, &loader, &registry, &NoopMetrics).await.unwrap();
        assert_eq!(*seen.lock().unwrap(), vec![true, true]);
        assert_eq!(registry.snapshot().number(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn batch_retries_only_failed_members_then_succeeds() {
        let mut h = Harness::new();
        let registry = RegistryStore::new();
        let fetcher = Scripted::new(vec![changed(
            "\"v1\"",
            vec![module("a", "1"), module("b", "1"), module("c", "1")],
        )]);

        let calls: Arc<Mutex<HashMap<String, u32>>> = Arc::default();
        let loader = {
            let calls = Arc::clone(&calls);
            LoaderFn::new(move |d: ModuleDescriptor| {
                let mut calls = calls.lock().unwrap();
                let n = calls.entry(d.name.clone()).or_insert(0);
                *n += 1;
                let res = if d.name == "b" && *n < 3 {
                    Err(LoadError::failed(&d.name, "flaky cdn"))
                } else {
                    Ok(d.name)
                };
                futures::future::ready(res)
            })
        };

        let mut rx = h.bus.subscribe();
        let out = h.run(&fetcher, &loader, &registry, &NoopMetrics).await.unwrap();
        assert!(matches!(out, CycleOutcome::Applied { commits: 1, .. }));

        let calls = calls.lock().unwrap();
        assert_eq!(calls["a"], 1);
        assert_eq!(calls["b"], 3);
        assert_eq!(calls["c"], 1);
        assert_eq!(registry.snapshot().len(), 3);

        let mut delays = Vec::new();
        while let Ok(ev) = rx.try_recv() {
            if ev.kind == EventKind::BatchRetryScheduled {
                delays.push(ev.delay_ms);
            }
        }
        assert_eq!(delays, vec![Some(250), Some(500)]);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_module_is_excluded_and_retried_next_cycle() {
        let mut h = Harness::new();
        let registry = RegistryStore::new();
        let v1 = || changed("\"v1\"", vec![module("root", "1"), module("a", "1"), module("b", "1")]);
        let fetcher = Scripted::new(vec![v1(), v1()]);

        let healthy = Arc::new(AtomicU32::new(0));
        let loader = {
            let healthy = Arc::clone(&healthy);
            LoaderFn::new(move |d: ModuleDescriptor| {
                let res = if d.name == "b" && healthy.load(Ordering::SeqCst) == 0 {
                    Err(LoadError::failed(&d.name, "404"))
                } else {
                    Ok(d.name)
                };
                futures::future::ready(res)
            })
        };
        let metrics = CounterMetrics::new();

        let err = h.run(&fetcher, &loader, &registry, &metrics).await.unwrap_err();
        match err {
            CycleError::Load { failed } => {
                assert_eq!(failed.len(), 1);
                assert_eq!(failed[0].module(), "b");
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(registry.snapshot().module_names(), vec!["a", "root"]);
        assert_eq!(metrics.snapshot().load_failures, 1);
        assert!(h.state.last_token.is_none());

        healthy.store(1, Ordering::SeqCst);
        let out = h.run(&fetcher, &loader, &registry, &metrics).await.unwrap();
        assert!(matches!(out, CycleOutcome::Applied { commits: 1, .. }));
        assert_eq!(registry.snapshot().module_names(), vec!["a", "b", "root"]);
    }

    #[tokio::test]
    async fn removal_only_change_commits_once() {
        let mut h = Harness::new();
        let registry = RegistryStore::new();
        let fetcher = Scripted::new(vec![
            changed("\"v1\"", vec![module("a", "1"), module("b", "1")]),
            changed("\"v2\"", vec![module("a", "1")]),
        ]);
        let loader = echo_loader();

        h.run(&fetcher, &loader, &registry, &NoopMetrics).await.unwrap();
        let before = registry.snapshot().number();

        let mut rx = h.bus.subscribe();
        let out = h.run(&fetcher, &loader, &registry, &NoopMetrics).await.unwrap();
        assert!(matches!(out, CycleOutcome::Applied { commits: 1, .. }));
        assert_eq!(registry.snapshot().number(), before + 1);
        assert_eq!(registry.snapshot().module_names(), vec!["a"]);

        let committed: Vec<Event> = std::iter::from_fn(|| rx.try_recv().ok())
            .filter(|e| e.kind == EventKind::GenerationCommitted)
            .collect();
        assert_eq!(committed.len(), 1);
        assert_eq!(committed[0].batch, None);
    }

    #[tokio::test]
    async fn fetch_failure_touches_nothing() {
        let mut h = Harness::new();
        let registry: RegistryStore<String> = RegistryStore::new();
        let fetcher = Scripted::new(vec![Err(FetchError::HttpStatus {
            url: "u".into(),
            status: 503,
        })]);

        let err = h
            .run(&fetcher, &echo_loader(), &registry, &NoopMetrics)
            .await
            .unwrap_err();
        assert_eq!(err.as_label(), "fetch_http_status");
        assert_eq!(registry.snapshot().number(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_load_times_out() {
        let mut h = Harness::new();
        h.cfg.load_timeout = Duration::from_secs(1);
        h.cfg.batch_retry = crate::policies::RetryPolicy::never();
        let registry = RegistryStore::new();
        let fetcher = Scripted::new(vec![changed("\"v1\"", vec![module("slow", "1")])]);
        let loader = LoaderFn::new(|d: ModuleDescriptor| async move {
            time::sleep(Duration::from_secs(5)).await;
            Ok::<_, LoadError>(d.name)
        });

        let err = h.run(&fetcher, &loader, &registry, &NoopMetrics).await.unwrap_err();
        assert_eq!(
            err,
            CycleError::Load {
                failed: vec![LoadError::Timeout {
                    module: "slow".into(),
                    timeout: Duration::from_secs(1)
                }]
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn abort_discards_in_flight_results() {
        let mut h = Harness::new();
        let registry = RegistryStore::new();
        let fetcher = Scripted::new(vec![changed("\"v1\"", vec![module("root", "1"), module("a", "1")])]);
        let loader = LoaderFn::new(|d: ModuleDescriptor| async move {
            time::sleep(Duration::from_secs(60)).await;
            Ok::<_, LoadError>(d.name)
        });

        let abort = h.abort.clone();
        tokio::spawn(async move {
            time::sleep(Duration::from_secs(1)).await;
            abort.cancel();
        });

        let err = h.run(&fetcher, &loader, &registry, &NoopMetrics).await.unwrap_err();
        assert_eq!(err, CycleError::Abandoned);
        assert_eq!(registry.snapshot().number(), 0);
    }
}
