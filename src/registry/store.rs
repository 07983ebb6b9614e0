//! # RegistryStore: copy-on-write module registry.
//!
//! The store owns the pointer to the current [`RegistryGeneration`]. Commits build a new
//! generation off to the side and publish it with a single pointer swap; readers clone the
//! `Arc` and keep a stable view for as long as they hold it.
//!
//! ## Architecture
//! ```text
//! commit(entries, removed, token)            snapshot()
//!   ├─► lock commit_lock (serializes writers)   └─► read-lock, Arc::clone, unlock
//!   ├─► copy current generation's map
//!   ├─► apply entries, then removals
//!   ├─► number += 1
//!   └─► write-lock, swap pointer, unlock
//! ```
//!
//! ## Rules
//! - The pointer lock is held only for an `Arc` clone or an `Arc` assignment; map copies
//!   happen outside of it, so readers never wait on a commit's work.
//! - A snapshot never changes after it was obtained.
//! - Commits are serialized; generation numbers are strictly increasing.
//! - A reader-side poisoned lock is recovered (the guarded value is always a complete `Arc`).

use std::sync::{Arc, Mutex, RwLock};

use crate::error::CommitError;
use crate::manifest::FreshnessToken;
use crate::registry::{LoadedModule, RegistryGeneration};

struct Inner<H> {
    current: RwLock<Arc<RegistryGeneration<H>>>,
    commit_lock: Mutex<()>,
}

/// Concurrently readable registry of loaded modules.
///
/// Cheap to clone; clones share the same current generation. Hand a clone to request
/// handlers and call [`snapshot`](Self::snapshot) once per request.
pub struct RegistryStore<H> {
    inner: Arc<Inner<H>>,
}

impl<H> Clone for RegistryStore<H> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<H> std::fmt::Debug for RegistryStore<H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let current = self.snapshot();
        f.debug_struct("RegistryStore")
            .field("generation", &current.number())
            .field("modules", &current.len())
            .finish()
    }
}

impl<H> Default for RegistryStore<H> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H> RegistryStore<H> {
    /// Creates a store whose current generation is empty (number `0`).
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                current: RwLock::new(Arc::new(RegistryGeneration::empty())),
                commit_lock: Mutex::new(()),
            }),
        }
    }

    /// Returns the current generation. Never fails and never waits on a commit's map copy.
    pub fn snapshot(&self) -> Arc<RegistryGeneration<H>> {
        match self.inner.current.read() {
            Ok(guard) => Arc::clone(&guard),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }

    fn publish(&self, next: Arc<RegistryGeneration<H>>) {
        match self.inner.current.write() {
            Ok(mut guard) => *guard = next,
            Err(poisoned) => *poisoned.into_inner() = next,
        }
    }
}

impl<H: Clone> RegistryStore<H> {
    /// Publishes a new generation: the current one plus `entries` (insert or replace),
    /// minus `removed`, tagged with `based_on`.
    ///
    /// Entries are applied before removals, so a name present in both ends up removed.
    /// Readers that already hold the previous generation keep seeing it unchanged.
    ///
    /// # Errors
    /// [`CommitError::Poisoned`] if an earlier commit panicked mid-way. The poison flag is
    /// cleared so that the next commit can proceed.
    pub fn commit<I, S>(
        &self,
        entries: Vec<LoadedModule<H>>,
        removed: I,
        based_on: Option<FreshnessToken>,
    ) -> Result<Arc<RegistryGeneration<H>>, CommitError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let _serial = match self.inner.commit_lock.lock() {
            Ok(guard) => guard,
            Err(_) => {
                self.inner.commit_lock.clear_poison();
                return Err(CommitError::Poisoned);
            }
        };

        let current = self.snapshot();
        let mut modules = current.modules.clone();
        for entry in entries {
            modules.insert(entry.descriptor.name.clone(), entry);
        }
        for name in removed {
            modules.remove(name.as_ref());
        }

        let next = Arc::new(RegistryGeneration {
            number: current.number + 1,
            modules,
            token: based_on,
        });
        self.publish(Arc::clone(&next));
        Ok(next)
    }
}
