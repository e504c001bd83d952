//! Retry policy
//!
//! Maps what the orchestrator just observed about a range to the next action.
//! The whole decision table lives in [`RetryPolicy::dispatch`]:
//!
//! | Observation                   | Exhausted | Action                    |
//! |-------------------------------|-----------|---------------------------|
//! | transport error               | no / yes  | resubmit (60s) / abandon  |
//! | status 0 or 1                 | -         | succeed                   |
//! | status 2                      | -         | nudge once                |
//! | status 4                      | no / yes  | resubmit (30s) / abandon  |
//! | status 6                      | -         | double-tap                |
//! | other status                  | no / yes  | resubmit (60s) / abandon  |
//! | after nudge: 0 or 1           | -         | succeed                   |
//! | after nudge: 6                | -         | double-tap                |
//! | after nudge: anything else    | no / yes  | resubmit (20s) / abandon  |
//! | double-tap gave up            | no / yes  | resubmit (15s) / abandon  |

use crate::models::JobStatus;
use hmis_common::config::DelayConfig;
use std::time::Duration;

/// Nudges attempted by one double-tap before giving up
pub const DOUBLE_TAP_MAX_NUDGES: u32 = 5;

/// What the orchestrator saw
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Observation {
    /// `search` or `submit` failed
    TransportError,
    /// Status returned by `submit`
    Submitted(JobStatus),
    /// Status after the single nudge given to a queued job
    Nudged(JobStatus),
    /// Double-tap ran all its nudges without reaching a success status
    DoubleTapExhausted,
}

/// Which throttle precedes a resubmission
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDelay {
    Transport,
    StageFailure,
    PostNudge,
    DoubleTap,
    UnknownStatus,
}

impl RetryDelay {
    pub fn duration(&self, delays: &DelayConfig) -> Duration {
        match self {
            RetryDelay::Transport => delays.transport_retry(),
            RetryDelay::StageFailure => delays.stage_failure_retry(),
            RetryDelay::PostNudge => delays.post_nudge_retry(),
            RetryDelay::DoubleTap => delays.double_tap_retry(),
            RetryDelay::UnknownStatus => delays.unknown_status_retry(),
        }
    }
}

/// Next step for a range
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Record success with the job id
    Succeed,
    /// Nudge once and dispatch the resulting status
    Nudge,
    /// Enter the bounded repeated-nudge sequence
    DoubleTap,
    /// Wait, then run the full search/submit cycle again
    Resubmit(RetryDelay),
    /// Attempts exhausted: record failure
    Abandon,
}

/// Attempt-bounded retry policy
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    max_attempts: u32,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32) -> Self {
        Self { max_attempts }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Attempts are exhausted once the counter passes the maximum
    pub fn exhausted(&self, attempts: u32) -> bool {
        attempts > self.max_attempts
    }

    /// Decide the next action for `observation` after `attempts` submissions
    pub fn dispatch(&self, observation: Observation, attempts: u32) -> Action {
        let retry_or_abandon = |delay: RetryDelay| {
            if self.exhausted(attempts) {
                Action::Abandon
            } else {
                Action::Resubmit(delay)
            }
        };

        match observation {
            Observation::TransportError => retry_or_abandon(RetryDelay::Transport),
            Observation::Submitted(status) if status.is_success() => Action::Succeed,
            Observation::Submitted(JobStatus::NeedsNudge) => Action::Nudge,
            Observation::Submitted(JobStatus::FailedRetryStage) => {
                retry_or_abandon(RetryDelay::StageFailure)
            }
            Observation::Submitted(JobStatus::FailedRetryNudge) => Action::DoubleTap,
            Observation::Submitted(_) => retry_or_abandon(RetryDelay::UnknownStatus),
            Observation::Nudged(status) if status.is_success() => Action::Succeed,
            Observation::Nudged(JobStatus::FailedRetryNudge) => Action::DoubleTap,
            Observation::Nudged(_) => retry_or_abandon(RetryDelay::PostNudge),
            Observation::DoubleTapExhausted => retry_or_abandon(RetryDelay::DoubleTap),
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(10)
    }
}
