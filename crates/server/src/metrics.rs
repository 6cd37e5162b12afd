//! Prometheus metrics for observability.
//!
//! This module provides metrics for monitoring the morpho server:
//! - WebSocket connection metrics
//! - Job counts by status (collected dynamically)
//! - Core metrics (jobs, conversions, sweeper) re-registered here

use once_cell::sync::Lazy;
use prometheus::{
    Encoder, IntCounter, IntCounterVec, IntGauge, IntGaugeVec, Opts, Registry, TextEncoder,
};

/// Global metrics registry.
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    register_metrics(&registry);
    registry
});

// =============================================================================
// WebSocket Metrics
// =============================================================================

/// Active WebSocket connections.
pub static WS_CONNECTIONS_ACTIVE: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "morpho_ws_connections_active",
        "Number of active WebSocket connections",
    )
    .unwrap()
});

/// Total WebSocket connections (cumulative).
pub static WS_CONNECTIONS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "morpho_ws_connections_total",
        "Total WebSocket connections since startup",
    )
    .unwrap()
});

/// WebSocket messages sent by type.
pub static WS_MESSAGES_SENT: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("morpho_ws_messages_sent_total", "WebSocket messages sent"),
        &["type"],
    )
    .unwrap()
});

/// WebSocket lag events (when client falls behind).
pub static WS_LAG_EVENTS: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "morpho_ws_lag_events_total",
        "WebSocket lag events (client fell behind)",
    )
    .unwrap()
});

// =============================================================================
// Job Metrics
// =============================================================================

/// Jobs by current status (collected dynamically).
pub static JOBS_BY_STATUS: Lazy<IntGaugeVec> = Lazy::new(|| {
    IntGaugeVec::new(
        Opts::new("morpho_jobs_by_status", "Current job count by status"),
        &["status"],
    )
    .unwrap()
});

/// Jobs created through the API since startup.
pub static JOBS_CREATED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "morpho_jobs_created_total",
        "Total jobs created since startup",
    )
    .unwrap()
});

// =============================================================================
// Scheduler Metrics (collected dynamically)
// =============================================================================

/// Scheduler running state (1 = running, 0 = stopped).
pub static SCHEDULER_RUNNING: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "morpho_scheduler_running",
        "Whether the scheduler is running (1) or stopped (0)",
    )
    .unwrap()
});

/// Jobs currently executing.
pub static SCHEDULER_ACTIVE: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "morpho_scheduler_active_jobs",
        "Number of jobs currently being executed",
    )
    .unwrap()
});

/// Work items waiting in the queue.
pub static SCHEDULER_QUEUED: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "morpho_scheduler_queued_jobs",
        "Number of work items waiting in the queue",
    )
    .unwrap()
});

// =============================================================================
// Registration
// =============================================================================

fn register_metrics(registry: &Registry) {
    // WebSocket
    registry
        .register(Box::new(WS_CONNECTIONS_ACTIVE.clone()))
        .unwrap();
    registry
        .register(Box::new(WS_CONNECTIONS_TOTAL.clone()))
        .unwrap();
    registry
        .register(Box::new(WS_MESSAGES_SENT.clone()))
        .unwrap();
    registry.register(Box::new(WS_LAG_EVENTS.clone())).unwrap();

    // Jobs
    registry
        .register(Box::new(JOBS_BY_STATUS.clone()))
        .unwrap();
    registry
        .register(Box::new(JOBS_CREATED_TOTAL.clone()))
        .unwrap();

    // Scheduler
    registry
        .register(Box::new(SCHEDULER_RUNNING.clone()))
        .unwrap();
    registry
        .register(Box::new(SCHEDULER_ACTIVE.clone()))
        .unwrap();
    registry
        .register(Box::new(SCHEDULER_QUEUED.clone()))
        .unwrap();

    // Core metrics (job lifecycle, conversions, sweeper)
    for metric in morpho_core::metrics::all_metrics() {
        registry.register(metric).unwrap();
    }
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer).unwrap();
    String::from_utf8(buffer).unwrap()
}

/// Collect dynamic metrics from current application state.
///
/// This is called before encoding metrics to update gauges with current
/// values from the scheduler and job store.
pub async fn collect_dynamic_metrics(state: &crate::state::AppState) {
    let status = state.scheduler().status().await;

    SCHEDULER_RUNNING.set(if status.running { 1 } else { 0 });
    SCHEDULER_ACTIVE.set(status.active as i64);
    SCHEDULER_QUEUED.set(status.queued as i64);

    JOBS_BY_STATUS
        .with_label_values(&["pending"])
        .set(status.pending_count);
    JOBS_BY_STATUS
        .with_label_values(&["processing"])
        .set(status.processing_count);
    JOBS_BY_STATUS
        .with_label_values(&["completed"])
        .set(status.completed_count);
    JOBS_BY_STATUS
        .with_label_values(&["failed"])
        .set(status.failed_count);
}
