//! # Module loader capability.
//!
//! A [`ModuleLoader`] resolves a descriptor to a loaded-module handle. What a handle is
//! (a compiled script, a child process, a WASM instance, a plain URL) is up to the host.

use async_trait::async_trait;

use crate::error::LoadError;
use crate::manifest::ModuleDescriptor;

/// # Loads one module bundle.
///
/// Called by the poll loop for every module in a batch; calls within a batch run
/// concurrently, so implementations must tolerate parallel `load` calls.
///
/// # Example
/// ```
/// use async_trait::async_trait;
/// use holocron_sync::{LoadError, ModuleDescriptor, ModuleLoader, Target};
///
/// struct UrlLoader;
///
/// #[async_trait]
/// impl ModuleLoader for UrlLoader {
///     type Handle = String;
///
///     async fn load(&self, d: &ModuleDescriptor) -> Result<String, LoadError> {
///         d.bundle(Target::Node)
///             .map(|b| b.url.clone())
///             .ok_or_else(|| LoadError::failed(&d.name, "no server bundle"))
///     }
/// }
/// ```
#[async_trait]
pub trait ModuleLoader: Send + Sync + 'static {
    /// Opaque loaded-module handle stored in registry generations.
    type Handle: Clone + Send + Sync + 'static;

    /// Loads the bundle described by `descriptor`.
    ///
    /// Return [`LoadError`] for any fetch/parse/execution failure; do not panic.
    async fn load(&self, descriptor: &ModuleDescriptor) -> Result<Self::Handle, LoadError>;
}
