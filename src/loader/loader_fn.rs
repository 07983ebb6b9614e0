//! # Function-backed loader (`LoaderFn`)
//!
//! [`LoaderFn`] wraps a closure `F: Fn(ModuleDescriptor) -> Fut`, producing a fresh
//! future per load. Shared state, if any, goes into an explicit `Arc` captured by the closure.
//!
//! ## Example
//! ```rust
//! use holocron_sync::{LoadError, LoaderFn, ModuleDescriptor};
//!
//! let loader = LoaderFn::new(|d: ModuleDescriptor| async move {
//!     Ok::<_, LoadError>(format!("{}@{}", d.name, d.version))
//! });
//! # let _ = loader;
//! ```

use std::future::Future;

use async_trait::async_trait;

use crate::error::LoadError;
use crate::loader::ModuleLoader;
use crate::manifest::ModuleDescriptor;

/// Function-backed loader implementation.
#[derive(Debug, Clone)]
pub struct LoaderFn<F> {
    f: F,
}

impl<F> LoaderFn<F> {
    /// Creates a loader from a closure.
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

#[async_trait]
impl<F, Fut, H> ModuleLoader for LoaderFn<F>
where
    F: Fn(ModuleDescriptor) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<H, LoadError>> + Send + 'static,
    H: Clone + Send + Sync + 'static,
{
    type Handle = H;

    async fn load(&self, descriptor: &ModuleDescriptor) -> Result<H, LoadError> {
        (self.f)(descriptor.clone()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::Target;

    #[tokio::test]
    async fn closure_receives_descriptor() {
        let loader = LoaderFn::new(|d: ModuleDescriptor| async move {
            if d.version.is_empty() {
                Err(LoadError::failed(d.name, "unversioned"))
            } else {
                Ok(format!("{}@{}", d.name, d.version))
            }
        });

        let ok = ModuleDescriptor::new("nav", "2.0.0").with_bundle(Target::Browser, "u", "i");
        assert_eq!(loader.load(&ok).await.unwrap(), "nav@2.0.0");

        let bad = ModuleDescriptor::new("nav", "").with_bundle(Target::Browser, "u", "i");
        assert_eq!(loader.load(&bad).await.unwrap_err().as_label(), "load_failed");
    }
}
