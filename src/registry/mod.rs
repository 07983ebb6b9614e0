//! Versioned module registry.
//!
//! ## Contents
//! - [`RegistryStore`] owner of the current generation pointer (commit / snapshot)
//! - [`RegistryGeneration`] immutable snapshot handed to readers
//! - [`LoadedModule`] handle + descriptor pair stored per module

mod generation;
mod store;

pub use generation::{LoadedModule, RegistryGeneration};
pub use store::RegistryStore;
