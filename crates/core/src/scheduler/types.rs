//! Scheduler types.

use serde::Serialize;
use thiserror::Error;

use crate::job::JobError;

/// Errors from scheduler operations.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// Job store error.
    #[error(transparent)]
    Job(#[from] JobError),

    /// The scheduler has been stopped and its queue is closed.
    #[error("Scheduler is not running")]
    NotRunning,
}

/// One unit of queued work.
///
/// The attempt number travels with the queue item, not the worker: retries
/// re-enqueue the same job id with the next attempt number, which keeps the
/// retry budget intact across worker restarts.
#[derive(Debug, Clone)]
pub(super) struct WorkItem {
    pub job_id: String,
    pub attempt: u32,
}

/// Point-in-time scheduler status.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SchedulerStatus {
    pub running: bool,
    pub workers: usize,
    /// Items waiting in the queue.
    pub queued: usize,
    /// Jobs currently being executed.
    pub active: usize,
    pub pending_count: i64,
    pub processing_count: i64,
    pub completed_count: i64,
    pub failed_count: i64,
}
