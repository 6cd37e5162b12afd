//! Progress event type.

use serde::{Deserialize, Serialize};

use crate::job::JobStatus;

/// One ephemeral progress update for a job. Published, never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub job_id: String,
    /// Coarse completion percentage: 10 (claimed), 30 (converter invoked),
    /// 70 (saving artifact), 100 (committed); 0 on failure.
    pub progress: u8,
    pub status: JobStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ProgressEvent {
    pub fn processing(job_id: impl Into<String>, progress: u8) -> Self {
        Self {
            job_id: job_id.into(),
            progress,
            status: JobStatus::Processing,
            error: None,
        }
    }

    pub fn completed(job_id: impl Into<String>) -> Self {
        Self {
            job_id: job_id.into(),
            progress: 100,
            status: JobStatus::Completed,
            error: None,
        }
    }

    pub fn failed(job_id: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            job_id: job_id.into(),
            progress: 0,
            status: JobStatus::Failed,
            error: Some(error.into()),
        }
    }

    /// Whether this event ends the stream for its job.
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}
