//! # Backoff policy for poll cycles.
//!
//! [`BackoffPolicy`] controls how the poll interval grows after consecutive failed cycles.
//! It is parameterized by:
//! - [`BackoffPolicy::base`] the healthy poll interval (also the first step of the curve);
//! - [`BackoffPolicy::factor`] the multiplicative growth factor;
//! - [`BackoffPolicy::max`] the maximum interval cap.
//!
//! The interval after `n` consecutive failures is `base × factor^n`, clamped to `max`,
//! then jitter is applied. The raw interval is derived purely from the failure count,
//! so jitter output never feeds back into later calculations.
//!
//! # Example
//! ```rust
//! use std::time::Duration;
//! use holocron_sync::{BackoffPolicy, JitterPolicy};
//!
//! let backoff = BackoffPolicy {
//!     base: Duration::from_secs(5),
//!     max: Duration::from_secs(60),
//!     factor: 2.0,
//!     jitter: JitterPolicy::None,
//! };
//!
//! // Healthy: poll every `base`.
//! assert_eq!(backoff.next(0), Duration::from_secs(5));
//! // Three failures in a row: 5s × 2^3 = 40s.
//! assert_eq!(backoff.next(3), Duration::from_secs(40));
//! // Capped at `max`.
//! assert_eq!(backoff.next(10), Duration::from_secs(60));
//! ```

use std::time::Duration;

use crate::policies::jitter::JitterPolicy;

/// Computes the next poll interval from the consecutive-failure count.
///
/// `min(base × 2^consecutive_failures, max)`, then passed through `jitter`.
/// Pure apart from whatever `jitter` does; pass `|d| d` for a deterministic result.
///
/// # Example
/// ```rust
/// use std::time::Duration;
/// use holocron_sync::next_interval;
///
/// let base = Duration::from_millis(5_000);
/// let max = Duration::from_millis(60_000);
/// let steps: Vec<u128> = (1..=4)
///     .map(|n| next_interval(base, max, n, |d| d).as_millis())
///     .collect();
/// assert_eq!(steps, vec![10_000, 20_000, 40_000, 60_000]);
/// ```
pub fn next_interval<J>(base: Duration, max: Duration, consecutive_failures: u32, jitter: J) -> Duration
where
    J: FnOnce(Duration) -> Duration,
{
    jitter(exponential(base, 2.0, consecutive_failures, max))
}

/// `first × factor^attempt` clamped to `max` (non-finite or negative results clamp too).
fn exponential(first: Duration, factor: f64, attempt: u32, max: Duration) -> Duration {
    let max_secs = max.as_secs_f64();
    let clamped_exp = attempt.min(i32::MAX as u32) as i32;
    let unclamped_secs = first.as_secs_f64() * factor.powi(clamped_exp);

    if !unclamped_secs.is_finite() || unclamped_secs < 0.0 || unclamped_secs > max_secs {
        max
    } else {
        Duration::from_secs_f64(unclamped_secs)
    }
}

/// Poll backoff policy.
///
/// Encapsulates parameters that determine how poll delays grow:
/// - [`BackoffPolicy::base`] interval while healthy;
/// - [`BackoffPolicy::factor`] multiplicative growth factor;
/// - [`BackoffPolicy::max`] the maximum delay cap.
#[derive(Clone, Copy, Debug)]
pub struct BackoffPolicy {
    /// Interval used while polls succeed, and the starting point of the curve.
    pub base: Duration,
    /// Maximum interval before jitter.
    pub max: Duration,
    /// Multiplicative growth factor (`2.0` doubles per failure).
    pub factor: f64,
    /// Jitter policy to avoid synchronized polling across instances.
    pub jitter: JitterPolicy,
}

impl Default for BackoffPolicy {
    /// Returns a policy with:
    /// - `base = 5s`;
    /// - `factor = 2.0`;
    /// - `max = 60s`;
    /// - `jitter = ±20%`.
    fn default() -> Self {
        Self {
            base: Duration::from_secs(5),
            max: Duration::from_secs(60),
            factor: 2.0,
            jitter: JitterPolicy::Symmetric { percent: 20 },
        }
    }
}

impl BackoffPolicy {
    /// Computes the interval after `consecutive_failures` failed cycles (`0` = healthy).
    ///
    /// Jitter is applied to the clamped value and may push it slightly above `max`
    /// for symmetric jitter.
    pub fn next(&self, consecutive_failures: u32) -> Duration {
        self.jitter.apply(self.unjittered(consecutive_failures))
    }

    /// Same curve as [`next`](Self::next) without jitter.
    pub fn unjittered(&self, consecutive_failures: u32) -> Duration {
        exponential(self.base, self.factor, consecutive_failures, self.max)
    }

    /// A policy with the same curve and no jitter.
    pub fn without_jitter(self) -> Self {
        Self {
            jitter: JitterPolicy::None,
            ..self
        }
    }
}
