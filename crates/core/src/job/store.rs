//! Job storage trait and request/filter types.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::format::{Category, Format};
use crate::job::{Job, JobStatus};

/// Error type for job store operations.
#[derive(Debug, Error)]
pub enum JobError {
    /// Job not found.
    #[error("Job not found: {0}")]
    NotFound(String),

    /// A claim lost the race: the job's attempt counter already moved past
    /// the expected value, so another worker owns this attempt.
    #[error("Stale claim for job {id}: attempts already at {attempts}")]
    StaleClaim { id: String, attempts: u32 },

    /// Database error.
    #[error("Database error: {0}")]
    Database(String),
}

/// Request to create a new job record.
#[derive(Debug, Clone)]
pub struct CreateJobRequest {
    pub original_filename: String,
    pub source_format: Format,
    pub target_format: Format,
    pub category: Category,
    /// Storage key of the already-stored upload.
    pub source_artifact: String,
    pub source_size: u64,
}

/// Filter for querying jobs.
#[derive(Debug, Clone)]
pub struct JobFilter {
    pub status: Option<JobStatus>,
    pub category: Option<Category>,
    /// Maximum number of results.
    pub limit: i64,
    /// Offset for pagination.
    pub offset: i64,
}

impl Default for JobFilter {
    fn default() -> Self {
        Self::new()
    }
}

impl JobFilter {
    pub fn new() -> Self {
        Self {
            status: None,
            category: None,
            limit: 100,
            offset: 0,
        }
    }

    pub fn with_status(mut self, status: JobStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_category(mut self, category: Category) -> Self {
        self.category = Some(category);
        self
    }

    pub fn with_limit(mut self, limit: i64) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_offset(mut self, offset: i64) -> Self {
        self.offset = offset;
        self
    }
}

/// Trait for job storage backends.
///
/// All mutations are single-row, last-writer-wins updates keyed by job id;
/// jobs are independent units so no cross-job locking is needed.
pub trait JobStore: Send + Sync {
    /// Create a new job record in `pending` status.
    fn create(&self, request: CreateJobRequest) -> Result<Job, JobError>;

    /// Get a job by id.
    fn get(&self, id: &str) -> Result<Option<Job>, JobError>;

    /// List jobs matching the filter, newest first.
    fn list(&self, filter: &JobFilter) -> Result<Vec<Job>, JobError>;

    /// Count jobs matching the filter.
    fn count(&self, filter: &JobFilter) -> Result<i64, JobError>;

    /// Claim the job for an execution attempt: status becomes `processing`,
    /// the attempt counter is incremented and any previous error is cleared.
    ///
    /// The claim is a compare-and-swap on the attempt counter: it succeeds
    /// only if `attempts` still equals `expected_attempts`, which makes a
    /// duplicate work item for the same attempt lose cleanly instead of
    /// racing a second worker onto the job.
    fn mark_processing(&self, id: &str, expected_attempts: u32) -> Result<Job, JobError>;

    /// Commit a successful conversion as one atomic update: status,
    /// converted artifact key, size, checksum and completion timestamp.
    fn complete(
        &self,
        id: &str,
        converted_artifact: &str,
        converted_size: u64,
        checksum: &str,
    ) -> Result<Job, JobError>;

    /// Record a failure: status becomes `failed` with the error preserved.
    fn fail(&self, id: &str, error: &str) -> Result<Job, JobError>;

    /// List jobs created before the cutoff, regardless of status.
    fn list_created_before(
        &self,
        cutoff: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<Job>, JobError>;

    /// Permanently delete a job record. Returns the deleted job if found.
    fn delete(&self, id: &str) -> Result<Job, JobError>;
}
