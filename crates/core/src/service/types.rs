//! Service request and error types.

use thiserror::Error;

use crate::format::FormatError;
use crate::job::JobError;
use crate::scheduler::SchedulerError;
use crate::storage::StorageError;

/// A conversion submission from a client.
#[derive(Debug, Clone)]
pub struct SubmitRequest {
    /// Filename as uploaded; the source format is derived from its
    /// extension.
    pub filename: String,
    /// Requested target format tag.
    pub target_format: String,
    /// Optional conversion category tag; derived from the source format
    /// when omitted.
    pub category: Option<String>,
    /// File contents.
    pub bytes: Vec<u8>,
}

/// Errors surfaced by the boundary operations.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Job or artifact does not exist.
    #[error("Job not found: {0}")]
    NotFound(String),

    /// Artifact requested before the conversion completed.
    #[error("Conversion not completed yet")]
    NotReady,

    /// The upload is oversized or not recognized.
    #[error("{0}")]
    Validation(String),

    /// The requested (source, target) pair has no route.
    #[error(transparent)]
    Unsupported(#[from] FormatError),

    /// Job store error.
    #[error(transparent)]
    Job(#[from] JobError),

    /// Artifact storage error.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// The scheduler rejected the submission.
    #[error(transparent)]
    Scheduler(#[from] SchedulerError),
}
