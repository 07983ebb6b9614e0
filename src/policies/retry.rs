//! # Per-batch retry policy.
//!
//! [`RetryPolicy`] bounds how often a batch with failed modules is re-attempted inside
//! a single poll cycle before the cycle gives up on those modules.
//!
//! ```text
//! attempt 1 ──► some modules failed ──► sleep(backoff.next(0)) ──► attempt 2 (failed only)
//!           ──► still failing        ──► sleep(backoff.next(1)) ──► attempt 3 (failed only)
//!           ──► max_attempts reached ──► commit what loaded, mark cycle failed
//! ```
//!
//! Modules given up on are not lost: they are absent from the registry and show up
//! again in the next cycle's diff.

use std::time::Duration;

use crate::policies::{BackoffPolicy, JitterPolicy};

/// Bounded retry of a batch within one poll cycle.
#[derive(Clone, Copy, Debug)]
pub struct RetryPolicy {
    /// Total attempts per batch, including the first (`>= 1`).
    pub max_attempts: u32,
    /// Delay between attempts; `backoff.next(k)` is slept after the `k+1`-th failed attempt.
    pub backoff: BackoffPolicy,
}

impl Default for RetryPolicy {
    /// Returns `3` attempts with 250ms doubling up to 2s, equal jitter.
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: BackoffPolicy {
                base: Duration::from_millis(250),
                max: Duration::from_secs(2),
                factor: 2.0,
                jitter: JitterPolicy::Equal,
            },
        }
    }
}

impl RetryPolicy {
    /// A policy that tries each batch exactly once.
    pub fn never() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Delay to sleep after `failed_attempts` attempts (1-based), or `None` if attempts are exhausted.
    pub fn delay_after(&self, failed_attempts: u32) -> Option<Duration> {
        if failed_attempts >= self.max_attempts {
            None
        } else {
            Some(self.backoff.next(failed_attempts.saturating_sub(1)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delays_until_exhausted() {
        let p = RetryPolicy {
            max_attempts: 3,
            backoff: RetryPolicy::default().backoff.without_jitter(),
        };
        assert_eq!(p.delay_after(1), Some(Duration::from_millis(250)));
        assert_eq!(p.delay_after(2), Some(Duration::from_millis(500)));
        assert_eq!(p.delay_after(3), None);
    }

    #[test]
    fn never_retries() {
        assert_eq!(RetryPolicy::never().delay_after(1), None);
    }
}
