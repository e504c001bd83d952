//! Export jobs and their status codes

use serde::{Deserialize, Serialize};
use std::fmt;

/// Export job status as reported by the service
///
/// Codes 3 and 5 are not distinguished by the stager and map to `Unknown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "i64", into = "i64")]
pub enum JobStatus {
    /// 0: export complete, files can be fetched
    ReadyToDownload,
    /// 1: export accepted and being staged
    Staging,
    /// 2: queued; needs a status poll to advance
    NeedsNudge,
    /// 4: staging failed; resubmit
    FailedRetryStage,
    /// 6: status not yet available; poll again
    FailedRetryNudge,
    /// Any other code
    Unknown(i64),
}

impl JobStatus {
    pub fn from_code(code: i64) -> Self {
        match code {
            0 => JobStatus::ReadyToDownload,
            1 => JobStatus::Staging,
            2 => JobStatus::NeedsNudge,
            4 => JobStatus::FailedRetryStage,
            6 => JobStatus::FailedRetryNudge,
            other => JobStatus::Unknown(other),
        }
    }

    pub fn code(&self) -> i64 {
        match self {
            JobStatus::ReadyToDownload => 0,
            JobStatus::Staging => 1,
            JobStatus::NeedsNudge => 2,
            JobStatus::FailedRetryStage => 4,
            JobStatus::FailedRetryNudge => 6,
            JobStatus::Unknown(code) => *code,
        }
    }

    /// Statuses that count as a successfully staged request
    pub fn is_success(&self) -> bool {
        matches!(self, JobStatus::ReadyToDownload | JobStatus::Staging)
    }
}

impl From<i64> for JobStatus {
    fn from(code: i64) -> Self {
        JobStatus::from_code(code)
    }
}

impl From<JobStatus> for i64 {
    fn from(status: JobStatus) -> Self {
        status.code()
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            JobStatus::ReadyToDownload => "ready",
            JobStatus::Staging => "staging",
            JobStatus::NeedsNudge => "needs nudge",
            JobStatus::FailedRetryStage => "stage failed",
            JobStatus::FailedRetryNudge => "status pending",
            JobStatus::Unknown(_) => "unknown",
        };
        write!(f, "{} ({})", name, self.code())
    }
}

/// Export job handle
///
/// Jobs are values: a nudge returns a fresh `Job` rather than mutating this one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    pub status: JobStatus,
}

impl Job {
    pub fn new(id: impl Into<String>, status: JobStatus) -> Self {
        Self {
            id: id.into(),
            status,
        }
    }

    /// Same job with a newly observed status
    pub fn with_status(&self, status: JobStatus) -> Self {
        Self {
            id: self.id.clone(),
            status,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(JobStatus::from_code(0), JobStatus::ReadyToDownload);
        assert_eq!(JobStatus::from_code(1), JobStatus::Staging);
        assert_eq!(JobStatus::from_code(2), JobStatus::NeedsNudge);
        assert_eq!(JobStatus::from_code(3), JobStatus::Unknown(3));
        assert_eq!(JobStatus::from_code(4), JobStatus::FailedRetryStage);
        assert_eq!(JobStatus::from_code(5), JobStatus::Unknown(5));
        assert_eq!(JobStatus::from_code(6), JobStatus::FailedRetryNudge);
        assert_eq!(JobStatus::from_code(-1).code(), -1);
    }

    #[test]
    fn test_success_class() {
        assert!(JobStatus::ReadyToDownload.is_success());
        assert!(JobStatus::Staging.is_success());
        assert!(!JobStatus::NeedsNudge.is_success());
        assert!(!JobStatus::FailedRetryNudge.is_success());
        assert!(!JobStatus::Unknown(7).is_success());
    }

    #[test]
    fn test_status_deserializes_from_integer() {
        let job: Job = serde_json::from_str(r#"{"id": "JSOC_20130801_1", "status": 6}"#).unwrap();
        assert_eq!(job.status, JobStatus::FailedRetryNudge);
    }

    #[test]
    fn test_with_status_keeps_id() {
        let job = Job::new("JSOC_20130801_1", JobStatus::NeedsNudge);
        let refreshed = job.with_status(JobStatus::Staging);
        assert_eq!(refreshed.id, job.id);
        assert_eq!(refreshed.status, JobStatus::Staging);
        assert_eq!(job.status, JobStatus::NeedsNudge);
    }
}
