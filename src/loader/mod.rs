//! Module loading boundary.
//!
//! The synchronizer never loads code itself. It asks a [`ModuleLoader`] to turn a
//! [`ModuleDescriptor`](crate::ModuleDescriptor) into an opaque handle and stores whatever
//! comes back in the registry.
//!
//! ## Contents
//! - [`ModuleLoader`] capability trait (`load(descriptor) -> handle | LoadError`)
//! - [`LoaderFn`] closure-backed loader

mod loader_fn;
mod module_loader;

pub use loader_fn::LoaderFn;
pub use module_loader::ModuleLoader;
