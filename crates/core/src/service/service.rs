//! Conversion service implementation.

use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::info;

use crate::config::LimitsConfig;
use crate::format::{Category, ConversionTable, Format};
use crate::job::{CreateJobRequest, Job, JobError, JobFilter, JobStatus, JobStore};
use crate::metrics;
use crate::progress::{ProgressEvent, ProgressPublisher};
use crate::scheduler::JobScheduler;
use crate::storage::{ArtifactStore, StorageError};

use super::types::{ServiceError, SubmitRequest};

/// Facade over the job store, artifact storage, scheduler and progress
/// publisher.
pub struct ConversionService {
    table: ConversionTable,
    store: Arc<dyn JobStore>,
    storage: Arc<dyn ArtifactStore>,
    scheduler: Arc<JobScheduler>,
    publisher: Arc<ProgressPublisher>,
    limits: LimitsConfig,
}

impl ConversionService {
    pub fn new(
        store: Arc<dyn JobStore>,
        storage: Arc<dyn ArtifactStore>,
        scheduler: Arc<JobScheduler>,
        publisher: Arc<ProgressPublisher>,
        limits: LimitsConfig,
    ) -> Self {
        Self {
            table: ConversionTable::new(),
            store,
            storage,
            scheduler,
            publisher,
            limits,
        }
    }

    /// Accepts an upload, creates a `pending` job and enqueues execution.
    ///
    /// All validation happens here, synchronously, before anything is
    /// stored: size limit, recognizable formats, and a route check so an
    /// unsupported pair is rejected up front instead of failing later in a
    /// worker.
    pub async fn submit(&self, request: SubmitRequest) -> Result<Job, ServiceError> {
        let filename = Self::sanitize_filename(&request.filename)?;

        if request.bytes.is_empty() {
            return Err(ServiceError::Validation("Uploaded file is empty".to_string()));
        }
        if request.bytes.len() as u64 > self.limits.max_upload_bytes {
            return Err(ServiceError::Validation(format!(
                "File size exceeds maximum allowed size of {} MB",
                self.limits.max_upload_bytes / (1024 * 1024)
            )));
        }

        let extension = filename
            .rsplit_once('.')
            .map(|(_, ext)| ext)
            .ok_or_else(|| {
                ServiceError::Validation("Filename has no extension".to_string())
            })?;
        let source_format = Format::parse(extension)
            .map_err(|_| ServiceError::Validation(format!("Unsupported file format: {}", extension)))?;

        let target_format = Format::parse(&request.target_format).map_err(|_| {
            ServiceError::Validation(format!(
                "Unsupported target format: {}",
                request.target_format
            ))
        })?;

        // Route check before any I/O.
        self.table.resolve(source_format, target_format)?;

        let category = match request.category.as_deref() {
            Some(tag) => Category::parse(tag)
                .map_err(|_| ServiceError::Validation(format!("Unknown category: {}", tag)))?,
            None => source_format.category(),
        };

        let source_key = format!("uploads/{}/{}", uuid::Uuid::new_v4(), filename);
        let source_size = self.storage.put_bytes(&source_key, &request.bytes).await?;

        let job = self.store.create(CreateJobRequest {
            original_filename: filename,
            source_format,
            target_format,
            category,
            source_artifact: source_key,
            source_size,
        })?;

        self.scheduler.submit(&job.id).await?;
        metrics::JOBS_SUBMITTED.inc();

        info!(
            job_id = %job.id,
            "Accepted {} -> {} conversion ({} bytes)",
            source_format,
            target_format,
            source_size
        );

        Ok(job)
    }

    /// Pure status read.
    pub fn status(&self, job_id: &str) -> Result<Job, ServiceError> {
        self.store
            .get(job_id)?
            .ok_or_else(|| ServiceError::NotFound(job_id.to_string()))
    }

    /// Returns the converted artifact with its download filename.
    pub async fn artifact(&self, job_id: &str) -> Result<(String, Vec<u8>), ServiceError> {
        let job = self.status(job_id)?;

        if job.status != JobStatus::Completed {
            return Err(ServiceError::NotReady);
        }

        let key = job
            .converted_artifact
            .as_deref()
            .ok_or(ServiceError::NotReady)?;

        let bytes = self.storage.read(key).await.map_err(|e| match e {
            StorageError::NotFound { .. } => ServiceError::NotFound(job_id.to_string()),
            other => ServiceError::Storage(other),
        })?;

        Ok((job.download_filename(), bytes))
    }

    /// Most recent jobs, newest first.
    pub fn list_recent(&self, limit: i64) -> Result<Vec<Job>, ServiceError> {
        Ok(self.store.list(&JobFilter::new().with_limit(limit))?)
    }

    /// Total number of jobs on record.
    pub fn total_count(&self) -> Result<i64, ServiceError> {
        Ok(self.store.count(&JobFilter::new())?)
    }

    /// Deletes the job record and both artifacts.
    pub async fn delete(&self, job_id: &str) -> Result<(), ServiceError> {
        let job = self.status(job_id)?;

        self.storage.delete(&job.source_artifact).await?;
        if let Some(ref key) = job.converted_artifact {
            self.storage.delete(key).await?;
        }

        match self.store.delete(job_id) {
            Ok(_) => {}
            // Raced with the sweeper or another delete; artifacts are gone
            // either way.
            Err(JobError::NotFound(_)) => {}
            Err(e) => return Err(e.into()),
        }

        self.publisher.forget(job_id).await;
        info!(job_id, "Deleted job and artifacts");
        Ok(())
    }

    /// Subscribes to future progress events for a job.
    pub async fn subscribe(&self, job_id: &str) -> broadcast::Receiver<ProgressEvent> {
        self.publisher.subscribe(job_id).await
    }

    fn sanitize_filename(raw: &str) -> Result<String, ServiceError> {
        let name = raw
            .rsplit(['/', '\\'])
            .next()
            .unwrap_or("")
            .trim()
            .to_string();
        if name.is_empty() || name == "." || name == ".." {
            return Err(ServiceError::Validation("Missing filename".to_string()));
        }
        Ok(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::ConversionExecutor;
    use crate::job::SqliteJobStore;
    use crate::scheduler::SchedulerConfig;
    use crate::storage::FsArtifactStore;

    async fn build_service() -> (ConversionService, tempfile::TempDir) {
        let temp = tempfile::tempdir().unwrap();
        let store: Arc<dyn JobStore> = Arc::new(SqliteJobStore::in_memory().unwrap());
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
        // The scheduler is deliberately not started; submitted jobs stay
        // pending so the synchronous surface can be tested in isolation.
        let scheduler = Arc::new(JobScheduler::new(
            SchedulerConfig::default(),
            Arc::clone(&store),
            executor,
            Arc::clone(&publisher),
            Arc::clone(&storage),
        ));

        let service = ConversionService::new(
            store,
            storage,
            scheduler,
            publisher,
            LimitsConfig {
                max_upload_bytes: 1024,
            },
        );
        (service, temp)
    }

    fn submit_request() -> SubmitRequest {
        SubmitRequest {
            filename: "photo.jpg".to_string(),
            target_format: "png".to_string(),
            category: None,
            bytes: b"fake jpeg".to_vec(),
        }
    }

    #[tokio::test]
    async fn test_submit_creates_pending_job() {
        let (service, _temp) = build_service().await;

        let job = service.submit(submit_request()).await.unwrap();
        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(job.source_format, Format::Jpg);
        assert_eq!(job.category, Category::Image);

        // Immediately observable via status.
        let fetched = service.status(&job.id).unwrap();
        assert_eq!(fetched.status, JobStatus::Pending);
    }

    #[tokio::test]
    async fn test_submit_rejects_oversized_upload() {
        let (service, _temp) = build_service().await;

        let mut request = submit_request();
        request.bytes = vec![0u8; 2048];
        let err = service.submit(request).await.unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));
        assert!(err.to_string().contains("exceeds maximum"));
    }

    #[tokio::test]
    async fn test_submit_rejects_unknown_source_format() {
        let (service, _temp) = build_service().await;

        let mut request = submit_request();
        request.filename = "malware.exe".to_string();
        let err = service.submit(request).await.unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));
    }

    #[tokio::test]
    async fn test_submit_rejects_unsupported_pair_synchronously() {
        let (service, _temp) = build_service().await;

        let mut request = submit_request();
        request.filename = "notes.txt".to_string();
        request.target_format = "mp4".to_string();
        let err = service.submit(request).await.unwrap_err();
        assert!(matches!(err, ServiceError::Unsupported(_)));
        // Nothing was created.
        assert_eq!(service.total_count().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_submit_strips_path_from_filename() {
        let (service, _temp) = build_service().await;

        let mut request = submit_request();
        request.filename = "../../etc/photo.jpg".to_string();
        let job = service.submit(request).await.unwrap();
        assert_eq!(job.original_filename, "photo.jpg");
    }

    #[tokio::test]
    async fn test_status_not_found() {
        let (service, _temp) = build_service().await;
        let err = service.status("missing").unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_artifact_not_ready_for_pending_job() {
        let (service, _temp) = build_service().await;

        let job = service.submit(submit_request()).await.unwrap();
        let err = service.artifact(&job.id).await.unwrap_err();
        assert!(matches!(err, ServiceError::NotReady));
    }

    #[tokio::test]
    async fn test_delete_nonexistent_job() {
        let (service, _temp) = build_service().await;
        let err = service.delete("missing").await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_delete_removes_record() {
        let (service, _temp) = build_service().await;

        let job = service.submit(submit_request()).await.unwrap();
        service.delete(&job.id).await.unwrap();

        assert!(matches!(
            service.status(&job.id),
            Err(ServiceError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_list_recent_newest_first() {
        let (service, _temp) = build_service().await;

        let first = service.submit(submit_request()).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        let second = service.submit(submit_request()).await.unwrap();

        let jobs = service.list_recent(10).unwrap();
        assert_eq!(jobs.len(), 2);
        assert_eq!(jobs[0].id, second.id);
        assert_eq!(jobs[1].id, first.id);
    }
}
