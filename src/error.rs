//! Error types used by the synchronizer runtime and its collaborators.
//!
//! This module defines the error taxonomy of a poll cycle:
//!
//! - [`FetchError`] the manifest could not be retrieved or parsed.
//! - [`LoadError`] a single module bundle failed to load.
//! - [`CommitError`] a generation could not be published (should not happen under correct locking).
//! - [`CycleError`] what a failed poll cycle reports to the loop.
//! - [`ConfigError`] the host supplied an unusable [`SyncConfig`](crate::SyncConfig).
//! - [`RuntimeError`] errors raised by the [`Synchronizer`](crate::Synchronizer) itself.
//!
//! Every enum provides `as_label()` (a short stable snake_case label) for logs/metrics.
//! None of these errors ever reach code reading the registry: readers only see snapshots.

use std::time::Duration;
use thiserror::Error;

/// # Errors produced while fetching the module map.
///
/// All variants are expected, transient conditions; the poll loop converts them into
/// backoff and metric updates instead of propagating them.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// Transport-level failure (DNS, connection refused, TLS, reset, invalid URL).
    #[error("network error fetching {url}: {reason}")]
    Network {
        /// URL that was requested.
        url: String,
        /// Underlying transport message.
        reason: String,
    },

    /// The server answered with a non-2xx status (other than `304 Not Modified`).
    #[error("unexpected HTTP status {status} from {url}")]
    HttpStatus {
        /// URL that was requested.
        url: String,
        /// Status code received.
        status: u16,
    },

    /// The document was received but is not a valid module map.
    #[error("malformed module map from {url}: {reason}")]
    Parse {
        /// URL that was requested.
        url: String,
        /// Parser or validation message.
        reason: String,
    },

    /// The fetch exceeded its configured deadline.
    #[error("fetching {url} timed out after {timeout:?}")]
    Timeout {
        /// URL that was requested.
        url: String,
        /// Deadline that was exceeded.
        timeout: Duration,
    },
}

impl FetchError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use holocron_sync::FetchError;
    ///
    /// let err = FetchError::HttpStatus { url: "https://cdn/module-map.json".into(), status: 503 };
    /// assert_eq!(err.as_label(), "fetch_http_status");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            FetchError::Network { .. } => "fetch_network",
            FetchError::HttpStatus { .. } => "fetch_http_status",
            FetchError::Parse { .. } => "fetch_parse",
            FetchError::Timeout { .. } => "fetch_timeout",
        }
    }

    /// True for failures of the transport itself. A timeout counts as one.
    pub fn is_network(&self) -> bool {
        matches!(self, FetchError::Network { .. } | FetchError::Timeout { .. })
    }
}

/// # Errors produced by a [`ModuleLoader`](crate::ModuleLoader) for one module.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LoadError {
    /// The bundle could not be fetched, parsed, or executed.
    #[error("module '{module}' failed to load: {reason}")]
    Failed {
        /// Module name.
        module: String,
        /// Loader-provided message.
        reason: String,
    },

    /// Loading exceeded the configured per-module deadline.
    #[error("module '{module}' load timed out after {timeout:?}")]
    Timeout {
        /// Module name.
        module: String,
        /// Deadline that was exceeded.
        timeout: Duration,
    },

    /// Loading was abandoned because the synchronizer is shutting down.
    #[error("module '{module}' load abandoned (shutdown)")]
    Canceled {
        /// Module name.
        module: String,
    },
}

impl LoadError {
    /// Convenience constructor for loader implementations.
    pub fn failed(module: impl Into<String>, reason: impl Into<String>) -> Self {
        LoadError::Failed {
            module: module.into(),
            reason: reason.into(),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            LoadError::Failed { .. } => "load_failed",
            LoadError::Timeout { .. } => "load_timeout",
            LoadError::Canceled { .. } => "load_canceled",
        }
    }

    /// Name of the module that failed.
    pub fn module(&self) -> &str {
        match self {
            LoadError::Failed { module, .. }
            | LoadError::Timeout { module, .. }
            | LoadError::Canceled { module } => module,
        }
    }
}

/// # Errors produced when publishing a registry generation.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommitError {
    /// A previous writer panicked while holding the commit lock.
    #[error("registry commit lock poisoned")]
    Poisoned,
}

impl CommitError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            CommitError::Poisoned => "commit_poisoned",
        }
    }
}

/// # Why a poll cycle failed.
///
/// A failed cycle moves the loop into backoff. Batches committed before the failure stay committed.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CycleError {
    /// The module map could not be fetched.
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// One or more modules still failed after exhausting their batch attempts.
    #[error("{} module(s) failed to load: {failed:?}", failed.len())]
    Load {
        /// Final error for every module that was excluded from this cycle.
        failed: Vec<LoadError>,
    },

    /// A generation could not be published.
    #[error(transparent)]
    Commit(#[from] CommitError),

    /// The cycle was abandoned because of shutdown; nothing further was committed.
    #[error("cycle abandoned (shutdown)")]
    Abandoned,
}

impl CycleError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            CycleError::Fetch(e) => e.as_label(),
            CycleError::Load { .. } => "cycle_load_failed",
            CycleError::Commit(e) => e.as_label(),
            CycleError::Abandoned => "cycle_abandoned",
        }
    }
}

/// # Invalid host configuration.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// `manifest_url` is empty.
    #[error("manifest url must not be empty")]
    EmptyManifestUrl,

    /// The backoff cap is below the base poll interval.
    #[error("max poll interval {max:?} is below base interval {base:?}")]
    MaxBelowBase {
        /// Configured base interval.
        base: Duration,
        /// Configured cap.
        max: Duration,
    },

    /// The base poll interval is zero.
    #[error("base poll interval must be greater than zero")]
    ZeroInterval,

    /// The batch retry policy allows no attempt at all.
    #[error("batch retry policy must allow at least one attempt")]
    ZeroAttempts,
}

impl ConfigError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            ConfigError::EmptyManifestUrl => "config_empty_manifest_url",
            ConfigError::MaxBelowBase { .. } => "config_max_below_base",
            ConfigError::ZeroInterval => "config_zero_interval",
            ConfigError::ZeroAttempts => "config_zero_attempts",
        }
    }
}

/// # Errors produced by the synchronizer runtime.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// The in-flight cycle did not finish within the grace period and was abandoned.
    #[error("shutdown grace {grace:?} exceeded; in-flight cycle abandoned")]
    GraceExceeded {
        /// The configured grace duration.
        grace: Duration,
    },

    /// The configuration was rejected before the loop started.
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    /// `run` was called more than once.
    #[error("synchronizer already running")]
    AlreadyRunning,

    /// The default HTTP client could not be built (TLS backend initialization).
    #[error("cannot build http client: {0}")]
    HttpClient(#[from] reqwest::Error),
}

impl RuntimeError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use holocron_sync::RuntimeError;
    /// use std::time::Duration;
    ///
    /// let err = RuntimeError::GraceExceeded { grace: Duration::from_secs(5) };
    /// assert_eq!(err.as_label(), "runtime_grace_exceeded");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            RuntimeError::GraceExceeded { .. } => "runtime_grace_exceeded",
            RuntimeError::Config(e) => e.as_label(),
            RuntimeError::AlreadyRunning => "runtime_already_running",
            RuntimeError::HttpClient(_) => "runtime_http_client",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_counts_as_network_failure() {
        let err = FetchError::Timeout {
            url: "u".into(),
            timeout: Duration::from_secs(1),
        };
        assert!(err.is_network());
        assert!(
            !FetchError::Parse {
                url: "u".into(),
                reason: "eof".into()
            }
            .is_network()
        );
    }

    #[test]
    fn cycle_error_forwards_inner_labels() {
        let err: CycleError = FetchError::HttpStatus {
            url: "u".into(),
            status: 500,
        }
        .into();
        assert_eq!(err.as_label(), "fetch_http_status");
        assert_eq!(CycleError::Abandoned.as_label(), "cycle_abandoned");
    }

    #[test]
    fn load_error_reports_module() {
        let err = LoadError::failed("checkout", "syntax error");
        assert_eq!(err.module(), "checkout");
        assert_eq!(err.to_string(), "module 'checkout' failed to load: syntax error");
    }
}
