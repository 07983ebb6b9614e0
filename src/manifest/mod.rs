//! Module map: data model, fetching, and diffing.
//!
//! ## Contents
//! - [`ModuleMap`], [`ModuleDescriptor`], [`BundleRef`], [`Target`], [`FreshnessToken`] the parsed manifest
//! - [`ManifestFetcher`], [`HttpManifestFetcher`], [`FetchOutcome`] conditional retrieval
//! - [`diff`], [`diff_against_generation`], [`ManifestDiff`] what changed between two maps

mod diff;
mod fetcher;
mod model;

pub use diff::{ManifestDiff, diff, diff_against_generation};
pub use fetcher::{FetchOutcome, HttpManifestFetcher, ManifestFetcher};
pub use model::{BundleRef, FreshnessToken, ModuleDescriptor, ModuleMap, ParseError, Target};
