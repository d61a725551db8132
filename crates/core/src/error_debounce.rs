//! Debounced surfacing of transient call failures.
//!
//! A single failed attempt against the perception service flickers and
//! usually recovers on the next retry; flashing it at clients teaches
//! them to ignore errors. Failures move through `Healthy -> Suspected ->
//! Confirmed`, and only `Confirmed` is ever shown: a failure must
//! survive the stability window without an intervening success.
//!
//! Callers inject the clock, so the machine is trivially testable and
//! never reads wall time itself.

use crate::types::Timestamp;

/// Seconds a suspected failure must persist before it is confirmed.
pub const ERROR_STABILITY_WINDOW_SECS: i64 = 5;

// ---------------------------------------------------------------------------
// State machine
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebounceState {
    /// No failures observed since the last success.
    Healthy,
    /// Failures observed, still inside the stability window.
    Suspected { since: Timestamp },
    /// Failures persisted past the stability window; surface them.
    Confirmed,
}

/// Tracks one error stream (typically one job's external calls).
#[derive(Debug, Clone)]
pub struct ErrorDebounce {
    state: DebounceState,
    window: chrono::Duration,
}

impl Default for ErrorDebounce {
    fn default() -> Self {
        Self::new()
    }
}

impl ErrorDebounce {
    pub fn new() -> Self {
        Self::with_window_secs(ERROR_STABILITY_WINDOW_SECS)
    }

    pub fn with_window_secs(secs: i64) -> Self {
        Self {
            state: DebounceState::Healthy,
            window: chrono::Duration::seconds(secs),
        }
    }

    pub fn state(&self) -> DebounceState {
        self.state
    }

    /// Whether the current state should be shown to clients.
    pub fn should_surface(&self) -> bool {
        self.state == DebounceState::Confirmed
    }

    /// Record a failed attempt at `now`.
    pub fn record_failure(&mut self, now: Timestamp) -> DebounceState {
        self.state = match self.state {
            DebounceState::Healthy => DebounceState::Suspected { since: now },
            DebounceState::Suspected { since } => {
                if now - since >= self.window {
                    DebounceState::Confirmed
                } else {
                    DebounceState::Suspected { since }
                }
            }
            DebounceState::Confirmed => DebounceState::Confirmed,
        };
        self.state
    }

    /// Record a successful attempt; any failure streak ends here.
    pub fn record_success(&mut self) -> DebounceState {
        self.state = DebounceState::Healthy;
        self.state
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use chrono::TimeZone;

    fn t(secs: i64) -> Timestamp {
        chrono::Utc
            .with_ymd_and_hms(2026, 3, 1, 12, 0, 0)
            .unwrap()
            + chrono::Duration::seconds(secs)
    }

    #[test]
    fn first_failure_only_suspects() {
        let mut d = ErrorDebounce::new();
        assert_matches!(d.record_failure(t(0)), DebounceState::Suspected { .. });
        assert!(!d.should_surface());
    }

    #[test]
    fn never_confirms_inside_the_window() {
        let mut d = ErrorDebounce::new();
        d.record_failure(t(0));
        assert_matches!(d.record_failure(t(4)), DebounceState::Suspected { .. });
        assert!(!d.should_surface());
    }

    #[test]
    fn confirms_once_the_window_elapses() {
        let mut d = ErrorDebounce::new();
        d.record_failure(t(0));
        assert_eq!(d.record_failure(t(5)), DebounceState::Confirmed);
        assert!(d.should_surface());
    }

    #[test]
    fn suspected_window_anchors_at_first_failure() {
        let mut d = ErrorDebounce::new();
        d.record_failure(t(0));
        d.record_failure(t(2));
        d.record_failure(t(4));
        // 5 s after the first failure, not the latest one.
        assert_eq!(d.record_failure(t(5)), DebounceState::Confirmed);
    }

    #[test]
    fn success_recovers_from_suspected() {
        let mut d = ErrorDebounce::new();
        d.record_failure(t(0));
        assert_eq!(d.record_success(), DebounceState::Healthy);
        // The streak restarts from scratch.
        d.record_failure(t(10));
        assert_matches!(d.record_failure(t(14)), DebounceState::Suspected { .. });
    }

    #[test]
    fn success_clears_confirmed() {
        let mut d = ErrorDebounce::new();
        d.record_failure(t(0));
        d.record_failure(t(6));
        assert!(d.should_surface());
        d.record_success();
        assert!(!d.should_surface());
    }

    #[test]
    fn confirmed_is_sticky_under_continued_failure() {
        let mut d = ErrorDebounce::new();
        d.record_failure(t(0));
        d.record_failure(t(6));
        assert_eq!(d.record_failure(t(7)), DebounceState::Confirmed);
    }
}
