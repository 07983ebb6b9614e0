//! # Synchronizer configuration.
//!
//! Provides [`SyncConfig`] centralized settings for the poll loop and its runtime.
//!
//! ## Sentinel values
//! - `fetch_timeout = 0s` → no deadline on the manifest request
//! - `load_timeout = 0s` → no deadline on a single module load
//! - `batch_size = 0` → treated as `1`
//! - `bus_capacity = 0` → treated as `1`

use std::time::Duration;

use crate::error::ConfigError;
use crate::policies::{BackoffPolicy, RetryPolicy};
use crate::schedule::DEFAULT_BATCH_SIZE;

/// Configuration supplied by the host.
///
/// ## Field semantics
/// - `manifest_url`: where the module map lives (must be non-empty)
/// - `root_module`: loaded first and alone in every cycle that touches it
/// - `backoff`: poll interval policy (`base` is the healthy interval, `max` the cap)
/// - `batch_size`: modules loaded concurrently per batch
/// - `batch_retry`: per-batch attempts within one cycle
/// - `fetch_timeout` / `load_timeout`: per-request and per-module deadlines (`0s` = none)
/// - `grace`: how long shutdown waits for an in-flight cycle
/// - `bus_capacity`: event bus ring buffer size
///
/// ## Notes
/// All fields are public. Prefer the helper accessors to avoid sprinkling sentinel
/// checks (`0`) across the codebase.
#[derive(Clone, Debug)]
pub struct SyncConfig {
    /// URL of the module map document.
    pub manifest_url: String,

    /// Name of the module every other module depends on (`None` = no root ordering).
    pub root_module: Option<String>,

    /// Poll interval and failure backoff.
    ///
    /// After a healthy cycle the loop waits `backoff.base`; after `n` consecutive
    /// failures it waits `min(base * 2^n, max)` with jitter applied.
    pub backoff: BackoffPolicy,

    /// Maximum modules per load batch.
    pub batch_size: usize,

    /// Attempts and delays for a batch whose members failed to load.
    pub batch_retry: RetryPolicy,

    /// Deadline for one manifest request.
    pub fetch_timeout: Duration,

    /// Deadline for one module load.
    pub load_timeout: Duration,

    /// Maximum wait for the in-flight cycle on shutdown.
    ///
    /// When it elapses, the cycle is abandoned at its next suspension point and
    /// nothing further is committed.
    pub grace: Duration,

    /// Capacity of the event bus broadcast channel ring buffer.
    pub bus_capacity: usize,
}

impl SyncConfig {
    /// Default configuration pointed at `manifest_url`.
    pub fn new(manifest_url: impl Into<String>) -> Self {
        Self {
            manifest_url: manifest_url.into(),
            ..Self::default()
        }
    }

    /// Sets the root module.
    pub fn with_root_module(mut self, name: impl Into<String>) -> Self {
        self.root_module = Some(name.into());
        self
    }

    /// Checks the configuration before the loop starts.
    ///
    /// # Errors
    /// - [`ConfigError::EmptyManifestUrl`] if `manifest_url` is blank
    /// - [`ConfigError::ZeroInterval`] if `backoff.base` is zero
    /// - [`ConfigError::MaxBelowBase`] if `backoff.max < backoff.base`
    /// - [`ConfigError::ZeroAttempts`] if `batch_retry.max_attempts` is zero
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.manifest_url.trim().is_empty() {
            return Err(ConfigError::EmptyManifestUrl);
        }
        if self.backoff.base.is_zero() {
            return Err(ConfigError::ZeroInterval);
        }
        if self.backoff.max < self.backoff.base {
            return Err(ConfigError::MaxBelowBase {
                base: self.backoff.base,
                max: self.backoff.max,
            });
        }
        if self.batch_retry.max_attempts == 0 {
            return Err(ConfigError::ZeroAttempts);
        }
        Ok(())
    }

    /// Manifest request deadline as an `Option` (`None` = no deadline).
    #[inline]
    pub fn fetch_timeout_opt(&self) -> Option<Duration> {
        Some(self.fetch_timeout).filter(|d| !d.is_zero())
    }

    /// Per-module load deadline as an `Option` (`None` = no deadline).
    #[inline]
    pub fn load_timeout_opt(&self) -> Option<Duration> {
        Some(self.load_timeout).filter(|d| !d.is_zero())
    }

    /// Batch size clamped to a minimum of 1.
    #[inline]
    pub fn batch_size_clamped(&self) -> usize {
        self.batch_size.max(1)
    }

    /// Bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }
}

impl Default for SyncConfig {
    /// Default configuration:
    ///
    /// - `manifest_url = ""` (must be set)
    /// - `root_module = None`
    /// - `backoff = BackoffPolicy::default()` (5s base, 60s cap, ±20% jitter)
    /// - `batch_size = 10`
    /// - `batch_retry = RetryPolicy::default()` (3 attempts)
    /// - `fetch_timeout = 10s`, `load_timeout = 0s` (none)
    /// - `grace = 30s`
    /// - `bus_capacity = 1024`
    fn default() -> Self {
        Self {
            manifest_url: String::new(),
            root_module: None,
            backoff: BackoffPolicy::default(),
            batch_size: DEFAULT_BATCH_SIZE,
            batch_retry: RetryPolicy::default(),
            fetch_timeout: Duration::from_secs(10),
            load_timeout: Duration::ZERO,
            grace: Duration::from_secs(30),
            bus_capacity: 1024,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_need_only_a_url() {
        assert_eq!(SyncConfig::default().validate(), Err(ConfigError::EmptyManifestUrl));

        let cfg = SyncConfig::new("https://cdn.example.com/module-map.json").with_root_module("frame");
        assert_eq!(cfg.validate(), Ok(()));
        assert_eq!(cfg.fetch_timeout_opt(), Some(Duration::from_secs(10)));
        assert_eq!(cfg.load_timeout_opt(), None);
        assert_eq!(cfg.root_module.as_deref(), Some("frame"));
    }

    #[test]
    fn rejects_inverted_backoff_bounds() {
        let mut cfg = SyncConfig::new("u");
        cfg.backoff.max = Duration::from_secs(1);
        assert!(matches!(cfg.validate(), Err(ConfigError::MaxBelowBase { .. })));

        cfg.backoff.base = Duration::ZERO;
        assert_eq!(cfg.validate(), Err(ConfigError::ZeroInterval));
    }

    #[test]
    fn rejects_zero_attempts() {
        let mut cfg = SyncConfig::new("u");
        cfg.batch_retry.max_attempts = 0;
        assert_eq!(cfg.validate(), Err(ConfigError::ZeroAttempts));
    }

    #[test]
    fn clamps_sentinels() {
        let mut cfg = SyncConfig::new("u");
        cfg.batch_size = 0;
        cfg.bus_capacity = 0;
        assert_eq!(cfg.batch_size_clamped(), 1);
        assert_eq!(cfg.bus_capacity_clamped(), 1);
    }
}
