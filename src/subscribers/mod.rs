//! # Event subscribers for the synchronizer runtime.
//!
//! This module provides the [`Subscribe`] trait, the [`SubscriberSet`] fan-out, and the
//! built-in [`LogWriter`].
//!
//! ## Architecture
//! ```text
//! PollLoop ── publish(Event) ──► Bus ──► subscriber_listener ──► SubscriberSet::emit(&Event)
//!                                                                ┌─────────┼─────────┐
//!                                                                ▼         ▼         ▼
//!                                                           LogWriter   Metrics   Custom
//! ```
//!
//! ## Implementing custom subscribers
//! ```no_run
//! use holocron_sync::{Event, EventKind, Subscribe};
//! use async_trait::async_trait;
//!
//! struct Pager;
//!
//! #[async_trait]
//! impl Subscribe for Pager {
//!     async fn on_event(&self, event: &Event) {
//!         if event.kind == EventKind::PollFailed && event.failures >= Some(10) {
//!             // page someone
//!         }
//!     }
//!
//!     fn name(&self) -> &'static str { "pager" }
//! }
//! ```

mod log;
mod set;
mod subscriber;

pub use log::LogWriter;
pub use set::SubscriberSet;
pub use subscriber::Subscribe;
