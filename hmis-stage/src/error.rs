//! Error types for hmis-stage
//!
//! Only outcome-log failures escape a staging session. Transport and nudge
//! errors are consumed by the retry policy and surface as log records.

use std::path::PathBuf;
use thiserror::Error;

/// Failure talking to the export service during `search` or `submit`
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("HTTP error {0}: {1}")]
    Http(u16, String),

    /// The service answered but reported an error in its payload
    #[error("Service error (status {status}): {message}")]
    Service { status: i64, message: String },

    #[error("Parse error: {0}")]
    Parse(String),
}

/// Best-effort nudge failure; never escalated on its own
#[derive(Debug, Error)]
pub enum NudgeError {
    #[error("Status refresh failed: {0}")]
    Transport(#[from] TransportError),

    #[error("Download directory {path} unavailable: {source}")]
    DownloadDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors that end a staging session
#[derive(Debug, Error)]
pub enum StageError {
    /// Audit records cannot be written; continuing would silently lose them
    #[error("Outcome log {path} not writable: {source}")]
    OutcomeLog {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Cancellation observed while waiting
    #[error("Staging cancelled")]
    Cancelled,

    #[error(transparent)]
    Common(#[from] hmis_common::Error),
}

/// Failure of the request-ID extraction utility
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("Invalid identifier prefix {0:?}")]
    InvalidPrefix(String),

    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
