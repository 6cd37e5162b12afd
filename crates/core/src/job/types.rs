//! Job entity and status types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::format::{Category, Format};

/// Lifecycle status of a job.
///
/// The progression is `pending -> processing -> {completed | failed}`.
/// `completed` and `failed` are terminal for external observers; the
/// scheduler may move a `failed` record back to `processing` when a retry
/// attempt begins, which is the only backwards edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(JobStatus::Pending),
            "processing" => Some(JobStatus::Processing),
            "completed" => Some(JobStatus::Completed),
            "failed" => Some(JobStatus::Failed),
            _ => None,
        }
    }

    /// Whether no further transitions will be observed once retries are
    /// exhausted.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One submitted conversion request and its tracked lifecycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    /// Externally shareable identifier, immutable after creation.
    pub id: String,
    /// Filename as uploaded, used to derive the download filename.
    pub original_filename: String,
    pub source_format: Format,
    pub target_format: Format,
    pub category: Category,
    pub status: JobStatus,
    /// Set if and only if status is `failed`.
    pub error_message: Option<String>,
    /// Storage key of the uploaded source artifact.
    pub source_artifact: String,
    /// Storage key of the converted artifact; set if and only if status is
    /// `completed`.
    pub converted_artifact: Option<String>,
    pub source_size: u64,
    pub converted_size: Option<u64>,
    /// SHA-256 of the converted artifact.
    pub checksum: Option<String>,
    /// Execution attempts started so far (1-based once claimed).
    pub attempts: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Job {
    /// Seconds from submission to completion, if completed.
    pub fn processing_time_secs(&self) -> Option<f64> {
        self.completed_at
            .map(|done| (done - self.created_at).num_milliseconds() as f64 / 1000.0)
    }

    /// Download filename for the converted artifact.
    pub fn download_filename(&self) -> String {
        let stem = self
            .original_filename
            .rsplit_once('.')
            .map(|(stem, _)| stem)
            .unwrap_or(&self.original_filename);
        format!("{}_converted.{}", stem, self.target_format)
    }
}
