//! # Poll loop state.
//!
//! [`PollState`] is owned by the poll loop and mutated only there. A read-only copy,
//! [`PollStatus`], is published through a `tokio::sync::watch` channel after every
//! phase change so health endpoints can report on the synchronizer without touching it.
//!
//! ## Phases
//! ```text
//!           ┌──────────────────────── timer / kick ───────────────────────┐
//!           ▼                                                             │
//!         Idle ──► Fetching ──► Unchanged ─────────────────────► SchedulingNext
//!                     │                                               ▲
//!                     ├──► Diffing ──► Loading ⇄ Committing ──────────┤
//!                     │        │          │                           │
//!                     └────────┴──────────┴──► Backoff ───────────────┘
//! ```

use std::time::Duration;

use crate::manifest::FreshnessToken;

/// Where the poll loop currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PollPhase {
    /// Waiting for the timer or a kick.
    #[default]
    Idle,
    /// Requesting the module map.
    Fetching,
    /// The module map did not change.
    Unchanged,
    /// Comparing the new module map with the registry.
    Diffing,
    /// Loading a batch of modules.
    Loading,
    /// Publishing a generation.
    Committing,
    /// The cycle failed; computing the backoff.
    Backoff,
    /// Arming the timer for the next cycle.
    SchedulingNext,
    /// The loop has exited.
    Stopped,
}

impl PollPhase {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            PollPhase::Idle => "idle",
            PollPhase::Fetching => "fetching",
            PollPhase::Unchanged => "unchanged",
            PollPhase::Diffing => "diffing",
            PollPhase::Loading => "loading",
            PollPhase::Committing => "committing",
            PollPhase::Backoff => "backoff",
            PollPhase::SchedulingNext => "scheduling_next",
            PollPhase::Stopped => "stopped",
        }
    }
}

/// Mutable loop state.
#[derive(Debug, Clone)]
pub(crate) struct PollState {
    /// Token of the last module map applied without failures.
    pub last_token: Option<FreshnessToken>,
    /// Back-to-back failed cycles.
    pub consecutive_failures: u32,
    /// Wait before the next cycle.
    pub interval: Duration,
    /// Current phase.
    pub phase: PollPhase,
    /// Cycles started so far.
    pub cycle: u64,
    /// Error label of the last failed cycle, cleared on success.
    pub last_error: Option<&'static str>,
}

impl PollState {
    /// Initial state: idle, no failures, `interval = base`.
    pub fn new(base: Duration) -> Self {
        Self {
            last_token: None,
            consecutive_failures: 0,
            interval: base,
            phase: PollPhase::Idle,
            cycle: 0,
            last_error: None,
        }
    }

    /// Records a successful cycle.
    pub fn succeeded(&mut self, token: Option<FreshnessToken>, base: Duration) {
        if token.is_some() {
            self.last_token = token;
        }
        self.consecutive_failures = 0;
        self.interval = base;
        self.last_error = None;
    }

    /// Records a failed cycle. The token is left alone so the next fetch is not
    /// short-circuited by a map that was never fully applied.
    pub fn failed(&mut self, label: &'static str) {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        self.last_error = Some(label);
    }

    /// Read-only copy for observers.
    pub fn status(&self, generation: u64) -> PollStatus {
        PollStatus {
            phase: self.phase,
            cycle: self.cycle,
            consecutive_failures: self.consecutive_failures,
            interval: self.interval,
            last_token: self.last_token.clone(),
            last_error: self.last_error,
            generation,
        }
    }
}

/// Snapshot of the poll loop, published after every phase change.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PollStatus {
    /// Current phase.
    pub phase: PollPhase,
    /// Cycles started so far.
    pub cycle: u64,
    /// Back-to-back failed cycles.
    pub consecutive_failures: u32,
    /// Wait before the next cycle (the one most recently scheduled).
    pub interval: Duration,
    /// Token of the last module map applied without failures.
    pub last_token: Option<FreshnessToken>,
    /// Error label of the last failed cycle (`None` after a success).
    pub last_error: Option<&'static str>,
    /// Current registry generation number.
    pub generation: u64,
}

impl PollStatus {
    /// True if the last cycle succeeded (or none has failed yet).
    pub fn is_healthy(&self) -> bool {
        self.consecutive_failures == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_keeps_token_and_success_resets() {
        let base = Duration::from_secs(5);
        let mut st = PollState::new(base);
        st.succeeded(Some(FreshnessToken::etag("\"v1\"")), base);

        st.failed("fetch_network");
        st.failed("fetch_network");
        st.interval = Duration::from_secs(20);
        assert_eq!(st.consecutive_failures, 2);
        assert_eq!(st.last_token, Some(FreshnessToken::etag("\"v1\"")));
        assert!(!st.status(3).is_healthy());

        // unchanged fetch: success without a new token
        st.succeeded(None, base);
        let status = st.status(3);
        assert!(status.is_healthy());
        assert_eq!(status.interval, base);
        assert_eq!(status.last_error, None);
        assert_eq!(status.last_token, Some(FreshnessToken::etag("\"v1\"")));
        assert_eq!(status.generation, 3);
    }
}
