//! Data models

pub mod job;
pub mod session;

pub use job::{Job, JobStatus};
pub use session::{RecordQuery, ResultSet, StagingSession};
