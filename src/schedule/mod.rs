//! Batch scheduling for module loads.
//!
//! See [`batch`] for the root-first grouping rules.

mod batch;

pub use batch::{DEFAULT_BATCH_SIZE, batch};
