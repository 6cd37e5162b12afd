//! Job scheduler implementation.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::{Duration, Instant};

use tokio::sync::{broadcast, mpsc, Mutex};
use tracing::{debug, error, info, warn};

use crate::executor::{ConversionExecutor, ExecuteError};
use crate::job::{JobError, JobFilter, JobStatus, JobStore};
use crate::metrics;
use crate::progress::{ProgressEvent, ProgressPublisher};
use crate::storage::ArtifactStore;

use super::config::SchedulerConfig;
use super::types::{SchedulerError, SchedulerStatus, WorkItem};

/// The job scheduler: worker pool, retry controller and terminal-state
/// committer.
pub struct JobScheduler {
    config: SchedulerConfig,
    store: Arc<dyn JobStore>,
    executor: Arc<ConversionExecutor>,
    publisher: Arc<ProgressPublisher>,
    storage: Arc<dyn ArtifactStore>,

    queue_tx: mpsc::Sender<WorkItem>,
    // Taken by start(); present only before the workers are spawned.
    queue_rx: StdMutex<Option<mpsc::Receiver<WorkItem>>>,

    running: Arc<AtomicBool>,
    active: Arc<AtomicUsize>,
    shutdown_tx: broadcast::Sender<()>,
}

impl JobScheduler {
    /// Creates a new scheduler. Call [`start`](Self::start) to spawn the
    /// worker pool.
    pub fn new(
        config: SchedulerConfig,
        store: Arc<dyn JobStore>,
        executor: Arc<ConversionExecutor>,
        publisher: Arc<ProgressPublisher>,
        storage: Arc<dyn ArtifactStore>,
    ) -> Self {
        let (queue_tx, queue_rx) = mpsc::channel(config.queue_capacity);
        let (shutdown_tx, _) = broadcast::channel(1);

        Self {
            config,
            store,
            executor,
            publisher,
            storage,
            queue_tx,
            queue_rx: StdMutex::new(Some(queue_rx)),
            running: Arc::new(AtomicBool::new(false)),
            active: Arc::new(AtomicUsize::new(0)),
            shutdown_tx,
        }
    }

    /// Enqueues a job for its first execution attempt.
    ///
    /// Jobs submitted before [`start`](Self::start) sit in the queue until
    /// the workers come up.
    pub async fn submit(&self, job_id: &str) -> Result<(), SchedulerError> {
        self.queue_tx
            .send(WorkItem {
                job_id: job_id.to_string(),
                attempt: 1,
            })
            .await
            .map_err(|_| SchedulerError::NotRunning)
    }

    /// Starts the worker pool and re-enqueues work left over from a
    /// previous run.
    pub async fn start(&self) {
        if self.running.swap(true, Ordering::SeqCst) {
            warn!("Scheduler already running");
            return;
        }

        let Some(queue_rx) = self.queue_rx.lock().unwrap().take() else {
            warn!("Scheduler queue already consumed; cannot restart");
            return;
        };

        info!("Starting job scheduler with {} workers", self.config.workers);

        let queue = Arc::new(Mutex::new(queue_rx));
        for worker_id in 0..self.config.workers {
            self.spawn_worker(worker_id, Arc::clone(&queue));
        }

        // Workers must be up before recovery: re-enqueueing goes through
        // the bounded queue and needs consumers on the other end.
        self.recover_incomplete_jobs().await;

        info!("Job scheduler started");
    }

    /// Stops the scheduler gracefully.
    pub async fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            warn!("Scheduler not running");
            return;
        }

        info!("Stopping job scheduler");

        let _ = self.shutdown_tx.send(());

        // Give workers a moment to finish current work
        tokio::time::sleep(Duration::from_millis(500)).await;

        info!("Job scheduler stopped");
    }

    /// Current scheduler status.
    pub async fn status(&self) -> SchedulerStatus {
        let count = |status: JobStatus| {
            self.store
                .count(&JobFilter::new().with_status(status))
                .unwrap_or(0)
        };

        SchedulerStatus {
            running: self.running.load(Ordering::Relaxed),
            workers: self.config.workers,
            queued: self.config.queue_capacity - self.queue_tx.capacity(),
            active: self.active.load(Ordering::Relaxed),
            pending_count: count(JobStatus::Pending),
            processing_count: count(JobStatus::Processing),
            completed_count: count(JobStatus::Completed),
            failed_count: count(JobStatus::Failed),
        }
    }

    /// Re-enqueues jobs that were interrupted by a previous shutdown:
    /// `pending` jobs that never ran, `processing` jobs whose worker died,
    /// and `failed` jobs that were waiting out a retry delay.
    async fn recover_incomplete_jobs(&self) {
        for status in [JobStatus::Pending, JobStatus::Processing, JobStatus::Failed] {
            let filter = JobFilter::new().with_status(status).with_limit(1000);
            let jobs = match self.store.list(&filter) {
                Ok(jobs) => jobs,
                Err(e) => {
                    error!("Failed to list {} jobs for recovery: {}", status, e);
                    continue;
                }
            };

            for job in jobs {
                if job.attempts >= self.config.max_attempts {
                    if status != JobStatus::Failed {
                        let _ = self.store.fail(
                            &job.id,
                            "Interrupted before completion; retry budget exhausted",
                        );
                    }
                    continue;
                }

                let item = WorkItem {
                    job_id: job.id.clone(),
                    attempt: job.attempts + 1,
                };
                if self.queue_tx.send(item).await.is_err() {
                    warn!("Queue closed during recovery");
                    return;
                }
                info!(job_id = %job.id, "Recovered {} job", status);
            }
        }
    }

    fn spawn_worker(&self, worker_id: usize, queue: Arc<Mutex<mpsc::Receiver<WorkItem>>>) {
        let store = Arc::clone(&self.store);
        let executor = Arc::clone(&self.executor);
        let publisher = Arc::clone(&self.publisher);
        let storage = Arc::clone(&self.storage);
        let config = self.config.clone();
        let queue_tx = self.queue_tx.clone();
        let running = Arc::clone(&self.running);
        let active = Arc::clone(&self.active);
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        tokio::spawn(async move {
            debug!(worker_id, "Worker started");
            loop {
                let item = {
                    let mut rx = queue.lock().await;
                    tokio::select! {
                        _ = shutdown_rx.recv() => None,
                        item = rx.recv() => item,
                    }
                };

                let Some(item) = item else {
                    break;
                };

                if !running.load(Ordering::Relaxed) {
                    break;
                }

                active.fetch_add(1, Ordering::Relaxed);
                Self::process_item(&store, &executor, &publisher, &storage, &config, &queue_tx, item)
                    .await;
                active.fetch_sub(1, Ordering::Relaxed);
            }
            debug!(worker_id, "Worker stopped");
        });
    }

    /// Runs one execution attempt for one queued item.
    #[allow(clippy::too_many_arguments)]
    async fn process_item(
        store: &Arc<dyn JobStore>,
        executor: &Arc<ConversionExecutor>,
        publisher: &Arc<ProgressPublisher>,
        storage: &Arc<dyn ArtifactStore>,
        config: &SchedulerConfig,
        queue_tx: &mpsc::Sender<WorkItem>,
        item: WorkItem,
    ) {
        // Missing-record guard: if the job is gone there is nothing to
        // mutate and nothing to retry.
        let job = match store.get(&item.job_id) {
            Ok(Some(job)) => job,
            Ok(None) => {
                warn!(job_id = %item.job_id, "Job record no longer exists, dropping work item");
                return;
            }
            Err(e) => {
                error!(job_id = %item.job_id, "Failed to load job: {}", e);
                return;
            }
        };

        if job.status == JobStatus::Completed {
            debug!(job_id = %job.id, "Job already completed, dropping duplicate work item");
            return;
        }

        // Convert the claim into a status update before doing any work, so
        // the store stays authoritative for what is in flight. The claim is
        // a compare-and-swap on the attempt counter: a duplicate delivery of
        // the same attempt loses here instead of racing a second worker
        // onto the job.
        let job = match store.mark_processing(&item.job_id, item.attempt - 1) {
            Ok(job) => job,
            Err(JobError::NotFound(_)) => {
                warn!(job_id = %item.job_id, "Job deleted before claim, dropping work item");
                return;
            }
            Err(JobError::StaleClaim { attempts, .. }) => {
                debug!(
                    job_id = %item.job_id,
                    attempt = item.attempt,
                    attempts,
                    "Duplicate work item lost the claim, dropping"
                );
                return;
            }
            Err(e) => {
                error!(job_id = %item.job_id, "Failed to claim job: {}", e);
                return;
            }
        };

        info!(
            job_id = %job.id,
            attempt = item.attempt,
            "Executing {} -> {} conversion",
            job.source_format,
            job.target_format
        );

        publisher.publish(ProgressEvent::processing(&job.id, 10)).await;

        // Forward the executor's coarse progress (30, 70) to subscribers.
        // The channel closes when the executor drops its sender, so awaiting
        // the forwarder below guarantees 70 is published before 100.
        let (progress_tx, mut progress_rx) = mpsc::channel::<u8>(8);
        let forward_publisher = Arc::clone(publisher);
        let forward_id = job.id.clone();
        let forwarder = tokio::spawn(async move {
            while let Some(pct) = progress_rx.recv().await {
                forward_publisher
                    .publish(ProgressEvent::processing(&forward_id, pct))
                    .await;
            }
        });

        let started = Instant::now();
        let result = executor
            .execute(
                &job,
                Some(progress_tx),
                Duration::from_secs(config.job_timeout_secs),
            )
            .await;
        let _ = forwarder.await;

        let category = job.category.as_str();
        metrics::CONVERSION_DURATION
            .with_label_values(&[category])
            .observe(started.elapsed().as_secs_f64());

        match result {
            Ok(artifact) => {
                metrics::JOB_ATTEMPTS.with_label_values(&["success"]).inc();
                metrics::CONVERSIONS_TOTAL
                    .with_label_values(&[category, "success"])
                    .inc();

                match store.complete(&job.id, &artifact.key, artifact.size, &artifact.checksum) {
                    Ok(_) => {
                        metrics::JOBS_FINISHED.with_label_values(&["completed"]).inc();
                        publisher.publish(ProgressEvent::completed(&job.id)).await;
                        info!(
                            job_id = %job.id,
                            size = artifact.size,
                            "Conversion completed in {} ms",
                            started.elapsed().as_millis()
                        );
                    }
                    Err(JobError::NotFound(_)) => {
                        // The job was deleted mid-flight; losing the write
                        // is benign, but the stored artifact is now
                        // orphaned.
                        info!(job_id = %job.id, "Job deleted during execution, discarding result");
                        let _ = storage.delete(&artifact.key).await;
                    }
                    Err(e) => {
                        Self::handle_failure(
                            store,
                            publisher,
                            config,
                            queue_tx,
                            &job.id,
                            item.attempt,
                            format!("Failed to commit conversion result: {}", e),
                        )
                        .await;
                    }
                }
            }
            Err(e) => {
                let outcome = if matches!(e, ExecuteError::Timeout { .. }) {
                    "timeout"
                } else {
                    "error"
                };
                metrics::JOB_ATTEMPTS.with_label_values(&[outcome]).inc();
                metrics::CONVERSIONS_TOTAL
                    .with_label_values(&[category, outcome])
                    .inc();
                Self::handle_failure(
                    store,
                    publisher,
                    config,
                    queue_tx,
                    &job.id,
                    item.attempt,
                    e.to_string(),
                )
                .await;
            }
        }
    }

    /// Records a failed attempt and schedules a retry if the budget allows.
    ///
    /// The record keeps the failure visible (status `failed` with the error
    /// attached) even while a retry is pending; the next claim flips it
    /// back to `processing`. Failure to record must not mask the original
    /// error, so recording problems are only logged.
    async fn handle_failure(
        store: &Arc<dyn JobStore>,
        publisher: &Arc<ProgressPublisher>,
        config: &SchedulerConfig,
        queue_tx: &mpsc::Sender<WorkItem>,
        job_id: &str,
        attempt: u32,
        error_msg: String,
    ) {
        if let Err(e) = store.fail(job_id, &error_msg) {
            warn!(job_id, "Failed to record error on job: {}", e);
        }

        publisher
            .publish(ProgressEvent::failed(job_id, &error_msg))
            .await;

        if attempt < config.max_attempts {
            metrics::JOB_RETRIES.inc();
            info!(
                job_id,
                attempt,
                "Attempt failed, retrying in {} s: {}",
                config.retry_delay_secs,
                error_msg
            );

            let queue_tx = queue_tx.clone();
            let delay = Duration::from_secs(config.retry_delay_secs);
            let job_id = job_id.to_string();
            let next_attempt = attempt + 1;
            tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                let item = WorkItem {
                    job_id: job_id.clone(),
                    attempt: next_attempt,
                };
                if queue_tx.send(item).await.is_err() {
                    warn!(job_id = %job_id, "Queue closed, dropping retry");
                }
            });
        } else {
            metrics::JOBS_FINISHED.with_label_values(&["failed"]).inc();
            warn!(
                job_id,
                "Job failed permanently after {} attempts: {}", attempt, error_msg
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::{CreateJobRequest, SqliteJobStore};
    use crate::storage::FsArtifactStore;
    use crate::format::{Category, Format};

    async fn build_scheduler(
        config: SchedulerConfig,
    ) -> (JobScheduler, Arc<SqliteJobStore>, tempfile::TempDir) {
        let temp = tempfile::tempdir().unwrap();
        let store = Arc::new(SqliteJobStore::in_memory().unwrap());
        let storage: Arc<dyn ArtifactStore> = Arc::new(
            FsArtifactStore::new(temp.path().join("artifacts"))
                .await
                .unwrap(),
        );
        let executor = Arc::new(ConversionExecutor::new(
            Arc::clone(&storage),
            temp.path().join("work"),
        ));
        let publisher = Arc::new(ProgressPublisher::default());

        let scheduler = JobScheduler::new(
            config,
            Arc::clone(&store) as Arc<dyn JobStore>,
            executor,
            publisher,
            storage,
        );
        (scheduler, store, temp)
    }

    fn pending_job(store: &SqliteJobStore) -> String {
        store
            .create(CreateJobRequest {
                original_filename: "photo.jpg".to_string(),
                source_format: Format::Jpg,
                target_format: Format::Png,
                category: Category::Image,
                source_artifact: "uploads/x/photo.jpg".to_string(),
                source_size: 10,
            })
            .unwrap()
            .id
    }

    #[tokio::test]
    async fn test_submit_before_start_queues() {
        let (scheduler, store, _temp) = build_scheduler(SchedulerConfig::default()).await;
        let job_id = pending_job(&store);

        scheduler.submit(&job_id).await.unwrap();

        let status = scheduler.status().await;
        assert!(!status.running);
        assert_eq!(status.queued, 1);
        assert_eq!(status.pending_count, 1);
    }

    #[tokio::test]
    async fn test_start_is_idempotent() {
        let (scheduler, _store, _temp) = build_scheduler(SchedulerConfig {
            workers: 1,
            ..Default::default()
        })
        .await;

        scheduler.start().await;
        scheduler.start().await; // second start is a no-op
        assert!(scheduler.status().await.running);
        scheduler.stop().await;
    }

    #[tokio::test]
    async fn test_missing_record_guard_drops_item() {
        let (scheduler, _store, _temp) = build_scheduler(SchedulerConfig {
            workers: 1,
            retry_delay_secs: 0,
            ..Default::default()
        })
        .await;

        scheduler.submit("no-such-job").await.unwrap();
        scheduler.start().await;

        tokio::time::sleep(Duration::from_millis(200)).await;

        // Nothing was created, nothing is in flight.
        let status = scheduler.status().await;
        assert_eq!(status.active, 0);
        assert_eq!(status.failed_count, 0);
        scheduler.stop().await;
    }
}
