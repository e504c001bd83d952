//! hmis-stage library interface
//!
//! Stages HMI SHARP export requests against the JSOC export service:
//! month-sized searches are bisected until they fit under the per-request
//! record limit, submitted, and driven through the service's status codes
//! until each range ends in one success or failure record.

pub mod error;
pub mod models;
pub mod policy;
pub mod range;
pub mod services;
pub mod types;

pub use crate::error::{ExtractError, NudgeError, StageError, TransportError};
pub use crate::models::{Job, JobStatus, RecordQuery, ResultSet, StagingSession};
pub use crate::range::TimeRange;
pub use crate::services::{SessionReport, StageOrchestrator};
pub use crate::types::StagingClient;
