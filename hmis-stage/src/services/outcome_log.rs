//! Outcome log
//!
//! Append-only audit trail of terminal range resolutions. Successes and
//! failures go to separate files; re-staging a range appends a new record
//! rather than replacing the old one.

use crate::error::StageError;
use crate::range::TimeRange;
use hmis_common::StagerConfig;
use std::path::{Path, PathBuf};
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

/// Terminal resolution of one range
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutcomeRecord {
    Success { range: TimeRange, job_id: String },
    Failure { range: TimeRange },
}

impl OutcomeRecord {
    pub fn range(&self) -> &TimeRange {
        match self {
            OutcomeRecord::Success { range, .. } | OutcomeRecord::Failure { range } => range,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, OutcomeRecord::Success { .. })
    }

    /// Log line, newline included
    pub fn line(&self) -> String {
        match self {
            OutcomeRecord::Success { range, job_id } => {
                format!("SUCCESS! Timespan: {}; ID: {}\n", range, job_id)
            }
            OutcomeRecord::Failure { range } => format!("FAIL! Timespan: {}\n", range),
        }
    }
}

/// Success and failure log files sharing one append lock
///
/// Concurrent sessions share a single `OutcomeLog`; the lock keeps each
/// line a single uninterrupted append.
#[derive(Debug)]
pub struct OutcomeLog {
    success_path: PathBuf,
    failure_path: PathBuf,
    append_lock: Mutex<()>,
}

impl OutcomeLog {
    pub fn new(success_path: impl Into<PathBuf>, failure_path: impl Into<PathBuf>) -> Self {
        Self {
            success_path: success_path.into(),
            failure_path: failure_path.into(),
            append_lock: Mutex::new(()),
        }
    }

    pub fn from_config(config: &StagerConfig) -> Self {
        Self::new(config.success_log_path(), config.failure_log_path())
    }

    pub fn success_path(&self) -> &Path {
        &self.success_path
    }

    pub fn failure_path(&self) -> &Path {
        &self.failure_path
    }

    pub async fn record_success(&self, range: TimeRange, job_id: &str) -> Result<(), StageError> {
        self.append(&OutcomeRecord::Success {
            range,
            job_id: job_id.to_string(),
        })
        .await
    }

    pub async fn record_failure(&self, range: TimeRange) -> Result<(), StageError> {
        self.append(&OutcomeRecord::Failure { range }).await
    }

    /// Append one record
    ///
    /// Any I/O failure is returned as [`StageError::OutcomeLog`], which ends
    /// the session.
    pub async fn append(&self, record: &OutcomeRecord) -> Result<(), StageError> {
        let path = if record.is_success() {
            &self.success_path
        } else {
            &self.failure_path
        };
        let line = record.line();

        let _guard = self.append_lock.lock().await;

        let to_stage_error = |source: std::io::Error| StageError::OutcomeLog {
            path: path.clone(),
            source,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(to_stage_error)?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await
            .map_err(to_stage_error)?;
        file.write_all(line.as_bytes()).await.map_err(to_stage_error)?;
        file.flush().await.map_err(to_stage_error)?;

        if record.is_success() {
            tracing::info!("{}", line.trim_end());
        } else {
            tracing::warn!("{}", line.trim_end());
        }

        Ok(())
    }
}
