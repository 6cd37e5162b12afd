//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Job lifecycle (submissions, completions, failures, retries)
//! - Conversion execution (duration, per-capability counts)
//! - Retention sweeps

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts};

// =============================================================================
// Job Lifecycle Metrics
// =============================================================================

/// Jobs submitted total.
pub static JOBS_SUBMITTED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new("morpho_jobs_submitted_total", "Total jobs submitted").unwrap()
});

/// Jobs that reached a terminal state, by result.
pub static JOBS_FINISHED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "morpho_jobs_finished_total",
            "Total jobs that reached a terminal state",
        ),
        &["result"], // "completed", "failed"
    )
    .unwrap()
});

/// Execution attempts total, by outcome.
pub static JOB_ATTEMPTS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("morpho_job_attempts_total", "Total job execution attempts"),
        &["outcome"], // "success", "error", "timeout"
    )
    .unwrap()
});

/// Retries scheduled after a failed attempt.
pub static JOB_RETRIES: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "morpho_job_retries_total",
        "Total retries scheduled after failed attempts",
    )
    .unwrap()
});

// =============================================================================
// Conversion Metrics
// =============================================================================

/// Conversions total by category and result.
pub static CONVERSIONS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("morpho_conversions_total", "Total conversion executions"),
        &["category", "result"], // category: "image", "document", "video"
    )
    .unwrap()
});

/// Conversion duration in seconds.
pub static CONVERSION_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "morpho_conversion_duration_seconds",
            "Duration of conversion executions",
        )
        .buckets(vec![
            0.1, 0.5, 1.0, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0, 600.0, 1800.0,
        ]),
        &["category"],
    )
    .unwrap()
});

// =============================================================================
// Retention Sweeper Metrics
// =============================================================================

/// Jobs reclaimed by the retention sweeper.
pub static SWEEPER_RECLAIMED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "morpho_sweeper_reclaimed_total",
        "Total jobs reclaimed by the retention sweeper",
    )
    .unwrap()
});

/// Sweep runs total by result.
pub static SWEEPER_RUNS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("morpho_sweeper_runs_total", "Total retention sweep runs"),
        &["result"], // "ok", "error"
    )
    .unwrap()
});

// =============================================================================
// Helper functions
// =============================================================================

/// Get all core metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        Box::new(JOBS_SUBMITTED.clone()),
        Box::new(JOBS_FINISHED.clone()),
        Box::new(JOB_ATTEMPTS.clone()),
        Box::new(JOB_RETRIES.clone()),
        Box::new(CONVERSIONS_TOTAL.clone()),
        Box::new(CONVERSION_DURATION.clone()),
        Box::new(SWEEPER_RECLAIMED.clone()),
        Box::new(SWEEPER_RUNS.clone()),
    ]
}
