//! # Jitter policy for poll and retry delays.
//!
//! [`JitterPolicy`] adds randomness to delays so that a fleet of hosts polling the same
//! module map does not hit the CDN in lockstep after a shared outage.
//!
//! - [`JitterPolicy::None`] no randomization, predictable delays
//! - [`JitterPolicy::Full`] random delay in [0, delay] (most aggressive)
//! - [`JitterPolicy::Equal`] delay/2 + random[0, delay/2] (balanced)
//! - [`JitterPolicy::Symmetric`] delay ± percent (keeps the mean, default for polling)

use rand::Rng;
use std::time::Duration;

/// Policy controlling randomization of delays.
///
/// ## Trade-offs
/// - **None**: predictable, but risks thundering herd
/// - **Full**: maximum spread, can shorten delays drastically
/// - **Equal**: never less than half the delay
/// - **Symmetric**: mean preserved, bounded spread on both sides
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum JitterPolicy {
    /// No jitter: use the exact delay.
    ///
    /// Use for tests and single-instance deployments.
    #[default]
    None,

    /// Full jitter: random delay in [0, delay].
    Full,

    /// Equal jitter: delay/2 + random[0, delay/2].
    Equal,

    /// Symmetric jitter: random delay in [delay × (1 - p), delay × (1 + p)] with `p = percent / 100`.
    ///
    /// `percent` above 100 is treated as 100.
    Symmetric {
        /// Half-width of the band, in percent of the delay.
        percent: u8,
    },
}

impl JitterPolicy {
    /// Applies jitter to the given delay.
    pub fn apply(&self, delay: Duration) -> Duration {
        match self {
            JitterPolicy::None => delay,
            JitterPolicy::Full => Self::full_jitter(delay),
            JitterPolicy::Equal => Self::equal_jitter(delay),
            JitterPolicy::Symmetric { percent } => Self::symmetric_jitter(delay, *percent),
        }
    }

    /// Full jitter: random[0, delay]
    fn full_jitter(delay: Duration) -> Duration {
        let ms = delay.as_millis() as u64;
        if ms == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rand::rng().random_range(0..=ms))
    }

    /// Equal jitter: delay/2 + random[0, delay/2]
    fn equal_jitter(delay: Duration) -> Duration {
        let ms = delay.as_millis() as u64;
        if ms == 0 {
            return Duration::ZERO;
        }
        let half = ms / 2;
        let jitter = if half == 0 {
            0
        } else {
            rand::rng().random_range(0..=half)
        };
        Duration::from_millis(half + jitter)
    }

    /// Symmetric jitter: delay ± delay × percent / 100
    fn symmetric_jitter(delay: Duration, percent: u8) -> Duration {
        let ms = delay.as_millis() as u64;
        let spread = ms.saturating_mul(u64::from(percent.min(100))) / 100;
        if spread == 0 {
            return delay;
        }
        let low = ms - spread;
        let high = ms.saturating_add(spread);
        Duration::from_millis(rand::rng().random_range(low..=high))
    }
}
