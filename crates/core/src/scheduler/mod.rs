//! Job scheduling and retry control.
//!
//! The scheduler owns the execution lifecycle: it dispatches queued jobs to
//! a worker pool, bounds each execution with a wall-clock ceiling, retries
//! failed attempts with a fixed delay up to a total attempt cap, and
//! commits terminal state to the job store while the progress publisher
//! broadcasts each transition.

mod config;
mod runner;
mod types;

pub use config::SchedulerConfig;
pub use runner::JobScheduler;
pub use types::{SchedulerError, SchedulerStatus};
