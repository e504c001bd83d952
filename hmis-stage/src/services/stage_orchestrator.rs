//! Staging orchestrator
//!
//! Drives each range of a session through search → (bisect | submit) →
//! status handling until it resolves to exactly one outcome record.
//!
//! # Architecture
//! Pending ranges sit in an explicit work queue. Each [`WorkItem`] carries its
//! own attempt counter: bisected halves start at zero, resubmissions keep the
//! count. Halves are pushed to the front of the queue left-first, so ranges
//! resolve in day order.
//!
//! Every wait is a throttle against the export service and checks the
//! cancellation token. Cancelled ranges are reported back, never logged.

use crate::error::StageError;
use crate::models::{Job, StagingSession};
use crate::policy::{Action, Observation, RetryPolicy, DOUBLE_TAP_MAX_NUDGES};
use crate::range::{self, SplitPlan, TimeRange};
use crate::services::outcome_log::OutcomeLog;
use crate::types::StagingClient;
use futures::stream::{self, StreamExt, TryStreamExt};
use hmis_common::config::DelayConfig;
use hmis_common::StagerConfig;
use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Pending range plus the submission cycles already spent on it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkItem {
    pub range: TimeRange,
    pub attempts: u32,
}

impl WorkItem {
    /// Freshly entered range (top level or bisected half)
    pub fn fresh(range: TimeRange) -> Self {
        Self { range, attempts: 0 }
    }
}

/// Result of one search/submit cycle
#[derive(Debug)]
enum Step {
    Bisect(TimeRange, TimeRange),
    Resubmit(Duration),
    Succeeded(Job),
    Abandoned,
}

/// Summary of one session (or one operator range) once its queue drained
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionReport {
    pub session_id: Uuid,
    pub year: i32,
    pub month: u32,
    /// Resolved ranges with their request ids, in resolution order
    pub successes: Vec<(TimeRange, String)>,
    /// Abandoned ranges
    pub failures: Vec<TimeRange>,
    /// Ranges replaced by two halves
    pub bisections: u32,
    /// Completed searches that led to a submit call
    pub submissions: u32,
    /// Single-day ranges submitted despite exceeding the record limit
    pub oversized: Vec<TimeRange>,
    /// Ranges left unresolved by cancellation
    pub cancelled: Vec<TimeRange>,
}

impl SessionReport {
    fn new(session: &StagingSession) -> Self {
        Self {
            session_id: session.session_id,
            year: session.year,
            month: session.month,
            successes: Vec::new(),
            failures: Vec::new(),
            bisections: 0,
            submissions: 0,
            oversized: Vec::new(),
            cancelled: Vec::new(),
        }
    }

    /// Every range resolved successfully
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty() && self.cancelled.is_empty()
    }

    fn merge(&mut self, other: SessionReport) {
        self.successes.extend(other.successes);
        self.failures.extend(other.failures);
        self.bisections += other.bisections;
        self.submissions += other.submissions;
        self.oversized.extend(other.oversized);
        self.cancelled.extend(other.cancelled);
    }
}

/// Orchestrator tuning taken from the stager configuration
#[derive(Debug, Clone)]
pub struct StageSettings {
    pub max_attempts: u32,
    pub max_records_per_request: u64,
    pub max_concurrent_sessions: usize,
    pub download_dir: PathBuf,
    pub delays: DelayConfig,
}

impl From<&StagerConfig> for StageSettings {
    fn from(config: &StagerConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            max_records_per_request: config.max_records_per_request,
            max_concurrent_sessions: config.max_concurrent_sessions,
            download_dir: config.download_dir.clone(),
            delays: config.delays.clone(),
        }
    }
}

/// Staging orchestrator service
pub struct StageOrchestrator {
    client: Arc<dyn StagingClient>,
    outcome_log: Arc<OutcomeLog>,
    policy: RetryPolicy,
    settings: StageSettings,
    cancel_token: CancellationToken,
}

impl StageOrchestrator {
    pub fn new(
        client: Arc<dyn StagingClient>,
        outcome_log: Arc<OutcomeLog>,
        settings: StageSettings,
        cancel_token: CancellationToken,
    ) -> Self {
        Self {
            client,
            outcome_log,
            policy: RetryPolicy::new(settings.max_attempts),
            settings,
            cancel_token,
        }
    }

    /// Build from configuration, with outcome logs under `config.log_dir`
    pub fn from_config(
        client: Arc<dyn StagingClient>,
        config: &StagerConfig,
        cancel_token: CancellationToken,
    ) -> Self {
        Self::new(
            client,
            Arc::new(OutcomeLog::from_config(config)),
            StageSettings::from(config),
            cancel_token,
        )
    }

    pub fn outcome_log(&self) -> &OutcomeLog {
        &self.outcome_log
    }

    /// Stage a whole month
    pub async fn run(&self, session: &StagingSession) -> Result<SessionReport, StageError> {
        let range = session.full_range()?;
        self.stage(session, range).await
    }

    /// Stage an operator-chosen window of a month, e.g. after a stall
    pub async fn run_range(
        &self,
        session: &StagingSession,
        start_day: u32,
        end_day: u32,
    ) -> Result<SessionReport, StageError> {
        let range = session.range(start_day, end_day)?;
        info!(
            session_id = %session.session_id,
            "Running with custom timeframe: {}",
            range
        );
        self.stage(session, range).await
    }

    /// Stage several months, at most `max_concurrent_sessions` at a time
    ///
    /// Reports come back in completion order. An outcome-log failure in any
    /// session stops all of them.
    pub async fn run_sessions(
        &self,
        sessions: &[StagingSession],
    ) -> Result<Vec<SessionReport>, StageError> {
        let limit = self.settings.max_concurrent_sessions.max(1);

        stream::iter(sessions.iter().map(|session| self.run(session)))
            .buffer_unordered(limit)
            .try_collect()
            .await
    }

    /// Stage `range` until every leaf range is resolved or cancelled
    pub async fn stage(
        &self,
        session: &StagingSession,
        range: TimeRange,
    ) -> Result<SessionReport, StageError> {
        let mut report = SessionReport::new(session);
        let mut queue = VecDeque::from([WorkItem::fresh(range)]);

        while let Some(mut item) = queue.pop_front() {
            if self.cancel_token.is_cancelled() {
                report.cancelled.push(item.range);
                report.cancelled.extend(queue.drain(..).map(|i| i.range));
                break;
            }

            let step = match self.cycle(session, &mut item, &mut report).await {
                Ok(step) => step,
                Err(StageError::Cancelled) => {
                    report.cancelled.push(item.range);
                    continue;
                }
                Err(e) => return Err(e),
            };

            match step {
                Step::Bisect(left, right) => {
                    report.bisections += 1;
                    queue.push_front(WorkItem::fresh(right));
                    queue.push_front(WorkItem::fresh(left));
                }
                Step::Resubmit(delay) => {
                    debug!(range = %item.range, attempts = item.attempts, ?delay, "Waiting to try again");
                    match self.pause(delay).await {
                        Ok(()) => queue.push_front(item),
                        Err(_) => report.cancelled.push(item.range),
                    }
                }
                Step::Succeeded(job) => {
                    // Terminal outcomes are recorded even if cancellation
                    // arrives during these throttles.
                    tokio::time::sleep(self.settings.delays.success_settle()).await;
                    tokio::time::sleep(self.settings.delays.log_throttle()).await;
                    self.outcome_log.record_success(item.range, &job.id).await?;
                    report.successes.push((item.range, job.id));
                }
                Step::Abandoned => {
                    tokio::time::sleep(self.settings.delays.log_throttle()).await;
                    self.outcome_log.record_failure(item.range).await?;
                    report.failures.push(item.range);
                }
            }
        }

        info!(
            session_id = %session.session_id,
            month = %session.label(),
            successes = report.successes.len(),
            failures = report.failures.len(),
            bisections = report.bisections,
            cancelled = report.cancelled.len(),
            "Staging finished"
        );

        Ok(report)
    }

    /// One full search → submit → status handling cycle for `item`
    async fn cycle(
        &self,
        session: &StagingSession,
        item: &mut WorkItem,
        report: &mut SessionReport,
    ) -> Result<Step, StageError> {
        let range = item.range;
        info!(
            session_id = %session.session_id,
            start = %range.start_time(),
            end = %range.end_time(),
            attempts = item.attempts,
            "Attempting to get request"
        );

        let results = match self.client.search(&session.query(range)).await {
            Ok(results) => results,
            Err(e) => {
                warn!(range = %range, error = %e, "Search failed");
                return Ok(self.resolve(Observation::TransportError, item.attempts));
            }
        };

        match range::plan(&range, results.count, self.settings.max_records_per_request) {
            SplitPlan::Bisect(left, right) => {
                info!(range = %range, count = results.count, "Halving ({} -> {} | {})", range, left, right);
                return Ok(Step::Bisect(left, right));
            }
            SplitPlan::Oversized => {
                warn!(
                    range = %range,
                    count = results.count,
                    limit = self.settings.max_records_per_request,
                    "Single day exceeds record limit; submitting without splitting"
                );
                if !report.oversized.contains(&range) {
                    report.oversized.push(range);
                }
            }
            SplitPlan::Submit => {}
        }

        item.attempts += 1;
        report.submissions += 1;
        debug!(range = %range, count = results.count, attempts = item.attempts, "Search successful; requesting data");

        self.pause(self.settings.delays.pre_submit()).await?;

        let job = match self.client.submit(&results).await {
            Ok(job) => job,
            Err(e) => {
                warn!(range = %range, attempts = item.attempts, error = %e, "Submit failed");
                return Ok(self.resolve(Observation::TransportError, item.attempts));
            }
        };

        info!(range = %range, request_id = %job.id, status = %job.status, "Request submitted");

        self.handle_job(job, item.attempts).await
    }

    /// Follow the retry policy from a submitted job to a terminal step
    async fn handle_job(&self, mut job: Job, attempts: u32) -> Result<Step, StageError> {
        let mut observation = Observation::Submitted(job.status);

        loop {
            match self.policy.dispatch(observation, attempts) {
                Action::Succeed => return Ok(Step::Succeeded(job)),
                Action::Nudge => {
                    job = self.nudge(job).await;
                    observation = Observation::Nudged(job.status);
                }
                Action::DoubleTap => {
                    job = self.double_tap(job).await?;
                    observation = if job.status.is_success() {
                        Observation::Nudged(job.status)
                    } else {
                        Observation::DoubleTapExhausted
                    };
                }
                Action::Resubmit(delay) => {
                    return Ok(Step::Resubmit(delay.duration(&self.settings.delays)));
                }
                Action::Abandon => {
                    warn!(request_id = %job.id, status = %job.status, attempts, "Max tries reached");
                    return Ok(Step::Abandoned);
                }
            }
        }
    }

    /// Terminal-or-retry step for observations that carry no job
    fn resolve(&self, observation: Observation, attempts: u32) -> Step {
        match self.policy.dispatch(observation, attempts) {
            Action::Resubmit(delay) => Step::Resubmit(delay.duration(&self.settings.delays)),
            _ => {
                warn!(attempts, "Max tries reached after transport errors");
                Step::Abandoned
            }
        }
    }

    /// Up to [`DOUBLE_TAP_MAX_NUDGES`] spaced nudges, stopping at the first success
    async fn double_tap(&self, mut job: Job) -> Result<Job, StageError> {
        info!(request_id = %job.id, status = %job.status, "Trying double-tapping method");

        for tap in 1..=DOUBLE_TAP_MAX_NUDGES {
            self.pause(self.settings.delays.double_tap_interval()).await?;
            job = self.nudge(job).await;

            if job.status.is_success() {
                info!(request_id = %job.id, tap, "Double-tapping method worked");
                return Ok(job);
            }
        }

        warn!(request_id = %job.id, status = %job.status, "Double-tapping method didn't work");
        Ok(job)
    }

    /// Nudge, keeping the last known job state if the nudge fails
    async fn nudge(&self, job: Job) -> Job {
        match self.client.nudge(&job, &self.settings.download_dir).await {
            Ok(refreshed) => {
                debug!(request_id = %refreshed.id, status = %refreshed.status, "Nudged");
                refreshed
            }
            Err(e) => {
                warn!(request_id = %job.id, error = %e, "Nudge failed; keeping last status");
                job
            }
        }
    }

    /// Cancellable throttle
    async fn pause(&self, duration: Duration) -> Result<(), StageError> {
        if self.cancel_token.is_cancelled() {
            return Err(StageError::Cancelled);
        }
        if duration.is_zero() {
            return Ok(());
        }

        tokio::select! {
            _ = self.cancel_token.cancelled() => Err(StageError::Cancelled),
            _ = tokio::time::sleep(duration) => Ok(()),
        }
    }
}

/// Combine per-month reports for a final summary
pub fn summarize(reports: &[SessionReport]) -> Option<SessionReport> {
    let mut iter = reports.iter().cloned();
    let mut total = iter.next()?;
    for report in iter {
        total.merge(report);
    }
    Some(total)
}
