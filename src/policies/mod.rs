//! Poll interval and retry policies.
//!
//! This module groups the knobs that control **how long** the synchronizer waits
//! between poll cycles and between attempts to load a failing batch.
//!
//! ## Contents
//! - [`BackoffPolicy`] how poll/retry delays evolve (base / factor / max + jitter)
//! - [`JitterPolicy`]  randomization strategy to avoid fleet-wide synchronization
//! - [`RetryPolicy`]   bounded per-batch retries inside one poll cycle
//! - [`next_interval`] the pure `min(base * 2^failures, max)` + jitter computation
//!
//! ## Quick wiring
//! ```text
//! SyncConfig { backoff: BackoffPolicy, batch_retry: RetryPolicy, .. }
//!      └─► core::poller::PollLoop uses:
//!           - backoff.next(consecutive_failures) to schedule the next cycle
//!      └─► core::cycle uses:
//!           - batch_retry.max_attempts / batch_retry.backoff between batch attempts
//! ```
//!
//! ## Defaults
//! - `BackoffPolicy::default()` → base=5s, factor=2.0, max=60s, jitter=±20%.
//! - `RetryPolicy::default()` → 3 attempts, 250ms doubling up to 2s, equal jitter.

mod backoff;
mod jitter;
mod retry;

pub use backoff::{BackoffPolicy, next_interval};
pub use jitter::JitterPolicy;
pub use retry::RetryPolicy;
