//! # Registry generations.
//!
//! A [`RegistryGeneration`] is one immutable, complete view of the loaded modules. Readers
//! hold it behind an `Arc`; the store never mutates a published generation.

use std::collections::HashMap;

use crate::manifest::{FreshnessToken, ModuleDescriptor};

/// A loaded module: the loader's handle plus the descriptor it was loaded from.
#[derive(Clone, Debug)]
pub struct LoadedModule<H> {
    /// Descriptor the handle was produced from.
    pub descriptor: ModuleDescriptor,
    /// Whatever the [`ModuleLoader`](crate::ModuleLoader) returned.
    pub handle: H,
}

impl<H> LoadedModule<H> {
    /// Pairs a descriptor with its loaded handle.
    pub fn new(descriptor: ModuleDescriptor, handle: H) -> Self {
        Self { descriptor, handle }
    }

    /// Module name.
    pub fn name(&self) -> &str {
        &self.descriptor.name
    }
}

/// Immutable snapshot of the loaded-module registry.
#[derive(Debug)]
pub struct RegistryGeneration<H> {
    pub(super) number: u64,
    pub(super) modules: HashMap<String, LoadedModule<H>>,
    pub(super) token: Option<FreshnessToken>,
}

impl<H> RegistryGeneration<H> {
    /// The empty generation every store starts with.
    pub(super) fn empty() -> Self {
        Self {
            number: 0,
            modules: HashMap::new(),
            token: None,
        }
    }

    /// Monotonic generation number (`0` = initial empty generation).
    pub fn number(&self) -> u64 {
        self.number
    }

    /// Freshness token of the module map this generation was built from.
    pub fn token(&self) -> Option<&FreshnessToken> {
        self.token.as_ref()
    }

    /// Loaded module by name.
    pub fn get(&self, name: &str) -> Option<&LoadedModule<H>> {
        self.modules.get(name)
    }

    /// Loader handle by name.
    pub fn handle(&self, name: &str) -> Option<&H> {
        self.modules.get(name).map(|m| &m.handle)
    }

    /// Descriptor the named module was loaded from.
    pub fn descriptor(&self, name: &str) -> Option<&ModuleDescriptor> {
        self.modules.get(name).map(|m| &m.descriptor)
    }

    /// True if the module is loaded.
    pub fn contains(&self, name: &str) -> bool {
        self.modules.contains_key(name)
    }

    /// Sorted module names.
    pub fn module_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.modules.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Loaded modules in arbitrary order.
    pub fn iter(&self) -> impl Iterator<Item = &LoadedModule<H>> {
        self.modules.values()
    }

    /// Number of loaded modules.
    pub fn len(&self) -> usize {
        self.modules.len()
    }

    /// True if nothing is loaded.
    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// True if both generations hold the same module releases (handles and numbers are not compared).
    pub fn same_modules<G>(&self, other: &RegistryGeneration<G>) -> bool {
        self.modules.len() == other.modules.len()
            && self.modules.iter().all(|(name, m)| {
                other
                    .modules
                    .get(name)
                    .is_some_and(|o| o.descriptor == m.descriptor)
            })
    }
}
