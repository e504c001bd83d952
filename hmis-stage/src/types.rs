//! Staging client trait
//!
//! The orchestrator talks to the export service only through this trait, so
//! the JSOC HTTP client and in-memory test clients are interchangeable.

use crate::error::{NudgeError, TransportError};
use crate::models::{Job, RecordQuery, ResultSet};
use std::path::Path;

/// Remote export service
///
/// # Example
/// ```rust,ignore
/// use hmis_stage::types::StagingClient;
///
/// let results = client.search(&session.query(range)).await?;
/// let job = client.submit(&results).await?;
/// let refreshed = client.nudge(&job, Path::new("HMI Downloaded Files")).await;
/// ```
#[async_trait::async_trait]
pub trait StagingClient: Send + Sync {
    /// Client name for log output
    fn name(&self) -> &'static str;

    /// Count the records matching `query`
    async fn search(&self, query: &RecordQuery) -> Result<ResultSet, TransportError>;

    /// Request export of a result set
    async fn submit(&self, results: &ResultSet) -> Result<Job, TransportError>;

    /// Prompt a stalled job to re-evaluate
    ///
    /// Returns the job with its authoritative post-call status. `job` itself is
    /// left untouched, so on error the caller still holds the last known state.
    async fn nudge(&self, job: &Job, download_dir: &Path) -> Result<Job, NudgeError>;
}
