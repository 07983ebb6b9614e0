//! Runtime core: poll loop, configuration, and lifecycle.
//!
//! The public API from this module is [`Synchronizer`] (with its builder and handle),
//! [`SyncConfig`], and the [`PollStatus`] it publishes.
//!
//! Internal modules:
//! - [`cycle`]: runs one fetch → diff → batch → load → commit cycle with event publishing;
//! - [`poller`]: runs cycles on a timer with failure backoff and kicks;
//! - [`synchronizer`]: owns the loop, fans out events, handles shutdown and grace;
//! - [`shutdown`]: cross-platform termination signal handling;
//! - [`state`]: loop state and its read-only status.

mod builder;
mod config;
mod cycle;
mod handle;
mod poller;
mod shutdown;
mod state;
mod synchronizer;

pub use builder::SynchronizerBuilder;
pub use config::SyncConfig;
pub use handle::SynchronizerHandle;
pub use state::{PollPhase, PollStatus};
pub use synchronizer::Synchronizer;
