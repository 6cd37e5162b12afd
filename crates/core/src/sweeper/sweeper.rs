//! Retention sweeper implementation.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::broadcast;
use tracing::{info, warn};

use crate::config::RetentionConfig;
use crate::job::{JobError, JobStore};
use crate::metrics;
use crate::storage::ArtifactStore;

/// Cap on jobs examined per sweep; anything beyond is picked up next run.
const SWEEP_BATCH_LIMIT: i64 = 10_000;

/// Reclaims jobs older than the configured age, along with both of their
/// artifacts.
pub struct RetentionSweeper {
    config: RetentionConfig,
    store: Arc<dyn JobStore>,
    storage: Arc<dyn ArtifactStore>,
    running: Arc<AtomicBool>,
    shutdown_tx: broadcast::Sender<()>,
}

impl RetentionSweeper {
    pub fn new(
        config: RetentionConfig,
        store: Arc<dyn JobStore>,
        storage: Arc<dyn ArtifactStore>,
    ) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            config,
            store,
            storage,
            running: Arc::new(AtomicBool::new(false)),
            shutdown_tx,
        }
    }

    /// Runs one sweep: every job created before the cutoff is reclaimed
    /// regardless of status. Returns the number of fully reclaimed jobs.
    ///
    /// A missing artifact is not an error; a per-job failure is logged and
    /// the sweep moves on to the next job.
    pub async fn sweep(&self, max_age_days: u32) -> Result<u64, JobError> {
        let cutoff = Utc::now() - chrono::Duration::days(max_age_days as i64);
        let expired = self.store.list_created_before(cutoff, SWEEP_BATCH_LIMIT)?;

        let mut reclaimed = 0u64;
        for job in expired {
            let artifacts = async {
                self.storage.delete(&job.source_artifact).await?;
                if let Some(ref key) = job.converted_artifact {
                    self.storage.delete(key).await?;
                }
                Ok::<(), crate::storage::StorageError>(())
            }
            .await;

            if let Err(e) = artifacts {
                warn!(job_id = %job.id, "Failed to reclaim artifacts: {}", e);
                continue;
            }

            match self.store.delete(&job.id) {
                Ok(_) => reclaimed += 1,
                // Deleted concurrently; nothing left to reclaim.
                Err(JobError::NotFound(_)) => {}
                Err(e) => {
                    warn!(job_id = %job.id, "Failed to delete expired job record: {}", e);
                }
            }
        }

        if reclaimed > 0 {
            metrics::SWEEPER_RECLAIMED.inc_by(reclaimed);
            info!(
                "Retention sweep reclaimed {} jobs older than {} days",
                reclaimed, max_age_days
            );
        }

        Ok(reclaimed)
    }

    /// Spawns the periodic sweep loop.
    pub fn start(self: &Arc<Self>) {
        if !self.config.enabled {
            info!("Retention sweeper disabled in config");
            return;
        }
        if self.running.swap(true, Ordering::SeqCst) {
            warn!("Retention sweeper already running");
            return;
        }

        let sweeper = Arc::clone(self);
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let interval = Duration::from_secs(self.config.sweep_interval_secs);
        let max_age_days = self.config.max_age_days;

        tokio::spawn(async move {
            info!(
                "Retention sweeper started (max age {} days, interval {} s)",
                max_age_days,
                interval.as_secs()
            );
            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        info!("Retention sweeper received shutdown signal");
                        break;
                    }
                    _ = tokio::time::sleep(interval) => {
                        if !sweeper.running.load(Ordering::Relaxed) {
                            break;
                        }
                        match sweeper.sweep(max_age_days).await {
                            Ok(_) => {
                                metrics::SWEEPER_RUNS.with_label_values(&["ok"]).inc();
                            }
                            Err(e) => {
                                metrics::SWEEPER_RUNS.with_label_values(&["error"]).inc();
                                warn!("Retention sweep failed: {}", e);
                            }
                        }
                    }
                }
            }
            info!("Retention sweeper stopped");
        });
    }

    /// Stops the sweep loop.
    pub fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }
        let _ = self.shutdown_tx.send(());
    }
}
