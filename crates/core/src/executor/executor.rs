//! Conversion executor implementation.

use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::fs;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::converter::{ConvertRequest, Converter, ConverterError};
use crate::format::{ConversionTable, ConverterKind, FormatError};
use crate::job::Job;
use crate::storage::{ArtifactStore, StorageError};

/// Errors from executing a single job.
#[derive(Debug, Error)]
pub enum ExecuteError {
    /// The route is not in the conversion table.
    #[error(transparent)]
    Unsupported(#[from] FormatError),

    /// The route resolved but no converter is registered for its kind.
    #[error("Converter capability unavailable: no {kind} converter registered")]
    CapabilityUnavailable { kind: ConverterKind },

    /// The converter itself failed.
    #[error(transparent)]
    Converter(#[from] ConverterError),

    /// Moving the output into durable storage failed.
    #[error("Failed to store converted artifact: {0}")]
    Storage(#[from] StorageError),

    /// Execution exceeded the wall-clock ceiling.
    #[error("Conversion timed out after {timeout_secs} seconds")]
    Timeout { timeout_secs: u64 },

    /// Scratch-space I/O failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// The durable result of a successful execution.
#[derive(Debug, Clone)]
pub struct ConvertedArtifact {
    /// Storage key of the converted artifact.
    pub key: String,
    pub size: u64,
    /// SHA-256 of the artifact contents, hex encoded.
    pub checksum: String,
}

/// Executes conversion jobs against the registered converter capabilities.
pub struct ConversionExecutor {
    table: ConversionTable,
    converters: HashMap<ConverterKind, Arc<dyn Converter>>,
    storage: Arc<dyn ArtifactStore>,
    work_dir: PathBuf,
}

impl ConversionExecutor {
    /// Creates an executor with no converters registered.
    pub fn new(storage: Arc<dyn ArtifactStore>, work_dir: PathBuf) -> Self {
        Self {
            table: ConversionTable::new(),
            converters: HashMap::new(),
            storage,
            work_dir,
        }
    }

    /// Registers a converter capability.
    pub fn with_converter(mut self, kind: ConverterKind, converter: Arc<dyn Converter>) -> Self {
        self.converters.insert(kind, converter);
        self
    }

    /// Validates every registered converter, returning the ones that are
    /// not ready. A missing capability is not fatal; jobs routed to it fail
    /// individually.
    pub async fn validate(&self) -> Vec<(ConverterKind, ConverterError)> {
        let mut failures = Vec::new();
        for (kind, converter) in &self.converters {
            if let Err(e) = converter.validate().await {
                failures.push((*kind, e));
            }
        }
        failures
    }

    /// Executes one job to a stored artifact, bounded by a wall-clock
    /// ceiling.
    ///
    /// If a progress sender is given it receives 30 when the converter is
    /// invoked and 70 when the converter has returned and the artifact is
    /// being saved; a dropped receiver never affects execution. The per-job
    /// scratch directory is removed on every exit path, including converter
    /// failures and timeouts.
    pub async fn execute(
        &self,
        job: &Job,
        progress_tx: Option<mpsc::Sender<u8>>,
        ceiling: Duration,
    ) -> Result<ConvertedArtifact, ExecuteError> {
        // Route check comes first so unsupported pairs fail before any I/O.
        let kind = self.table.resolve(job.source_format, job.target_format)?;
        let converter = self
            .converters
            .get(&kind)
            .ok_or(ExecuteError::CapabilityUnavailable { kind })?;

        let scratch = self.work_dir.join(&job.id);
        fs::create_dir_all(&scratch).await?;

        // The timeout wraps the work but not the cleanup: cancelling the
        // inner future kills any spawned tool process, and the scratch
        // directory is removed regardless.
        let result = match timeout(
            ceiling,
            self.run_in(job, converter.as_ref(), &scratch, progress_tx),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(ExecuteError::Timeout {
                timeout_secs: ceiling.as_secs(),
            }),
        };

        if let Err(e) = fs::remove_dir_all(&scratch).await {
            warn!(job_id = %job.id, "Failed to remove scratch directory: {}", e);
        }

        result
    }

    async fn run_in(
        &self,
        job: &Job,
        converter: &dyn Converter,
        scratch: &Path,
        progress_tx: Option<mpsc::Sender<u8>>,
    ) -> Result<ConvertedArtifact, ExecuteError> {
        // Materialize the source artifact for the converter.
        let input_path = scratch.join(format!("input.{}", job.source_format));
        let source_bytes = self.storage.read(&job.source_artifact).await?;
        fs::write(&input_path, &source_bytes).await?;
        drop(source_bytes);

        debug!(
            job_id = %job.id,
            converter = converter.name(),
            "Converting {} -> {}",
            job.source_format,
            job.target_format
        );

        if let Some(ref tx) = progress_tx {
            let _ = tx.send(30).await;
        }

        let output_path = converter
            .convert(ConvertRequest {
                job_id: job.id.clone(),
                input_path,
                source_format: job.source_format,
                target_format: job.target_format,
                output_dir: scratch.to_path_buf(),
            })
            .await?;

        // The artifact must exist and be non-empty before anything is
        // committed.
        let meta = fs::metadata(&output_path).await.map_err(|_| {
            ConverterError::EmptyOutput {
                path: output_path.clone(),
            }
        })?;
        if meta.len() == 0 {
            return Err(ConverterError::EmptyOutput { path: output_path }.into());
        }

        if let Some(ref tx) = progress_tx {
            let _ = tx.send(70).await;
        }

        let checksum = Self::file_sha256(&output_path).await?;

        let key = format!("converted/{}/{}", job.id, job.download_filename());
        let size = self.storage.put_file(&key, &output_path).await?;

        Ok(ConvertedArtifact {
            key,
            size,
            checksum,
        })
    }

    async fn file_sha256(path: &Path) -> Result<String, std::io::Error> {
        use tokio::io::AsyncReadExt;

        let mut file = fs::File::open(path).await?;
        let mut hasher = Sha256::new();
        let mut buffer = vec![0u8; 64 * 1024];

        loop {
            let read = file.read(&mut buffer).await?;
            if read == 0 {
                break;
            }
            hasher.update(&buffer[..read]);
        }

        Ok(format!("{:x}", hasher.finalize()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::{Category, Format};
    use crate::job::JobStatus;
    use crate::storage::FsArtifactStore;
    use async_trait::async_trait;
    use chrono::Utc;

    /// Writes a fixed payload as its output.
    struct StubConverter {
        payload: &'static [u8],
    }

    #[async_trait]
    impl Converter for StubConverter {
        fn name(&self) -> &str {
            "stub"
        }

        async fn convert(&self, request: ConvertRequest) -> Result<PathBuf, ConverterError> {
            let output = request.default_output_path();
            tokio::fs::write(&output, self.payload).await?;
            Ok(output)
        }

        async fn validate(&self) -> Result<(), ConverterError> {
            Ok(())
        }
    }

    fn test_job(source: Format, target: Format) -> Job {
        Job {
            id: uuid::Uuid::new_v4().to_string(),
            original_filename: format!("input.{}", source),
            source_format: source,
            target_format: target,
            category: Category::Image,
            status: JobStatus::Processing,
            error_message: None,
            source_artifact: String::new(),
            converted_artifact: None,
            source_size: 0,
            converted_size: None,
            checksum: None,
            attempts: 1,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            completed_at: None,
        }
    }

    async fn harness() -> (Arc<FsArtifactStore>, PathBuf, tempfile::TempDir) {
        let temp = tempfile::tempdir().unwrap();
        let storage = Arc::new(
            FsArtifactStore::new(temp.path().join("artifacts"))
                .await
                .unwrap(),
        );
        let work_dir = temp.path().join("work");
        (storage, work_dir, temp)
    }

    #[tokio::test]
    async fn test_execute_happy_path() {
        let (storage, work_dir, _temp) = harness().await;

        let mut job = test_job(Format::Jpg, Format::Png);
        job.source_artifact = format!("uploads/{}/input.jpg", job.id);
        storage
            .put_bytes(&job.source_artifact, b"fake jpeg")
            .await
            .unwrap();

        let executor = ConversionExecutor::new(storage.clone(), work_dir.clone())
            .with_converter(ConverterKind::Image, Arc::new(StubConverter { payload: b"png!" }));

        let artifact = executor.execute(&job, None, Duration::from_secs(30)).await.unwrap();
        assert_eq!(artifact.size, 4);
        assert!(artifact.key.starts_with(&format!("converted/{}/", job.id)));
        assert_eq!(storage.read(&artifact.key).await.unwrap(), b"png!");

        // Checksum matches the stored bytes.
        let expected = format!("{:x}", Sha256::digest(b"png!"));
        assert_eq!(artifact.checksum, expected);

        // Scratch space is gone.
        assert!(!work_dir.join(&job.id).exists());
    }

    #[tokio::test]
    async fn test_unsupported_pair_fails_before_io() {
        let (storage, work_dir, _temp) = harness().await;

        // Source artifact deliberately absent: resolution must fail first.
        let job = test_job(Format::Txt, Format::Mp4);
        let executor = ConversionExecutor::new(storage, work_dir);

        let err = executor.execute(&job, None, Duration::from_secs(30)).await.unwrap_err();
        assert!(matches!(
            err,
            ExecuteError::Unsupported(FormatError::UnsupportedConversion { .. })
        ));
    }

    #[tokio::test]
    async fn test_missing_capability() {
        let (storage, work_dir, _temp) = harness().await;

        let job = test_job(Format::Mp4, Format::Gif);
        // No video converter registered.
        let executor = ConversionExecutor::new(storage, work_dir);

        let err = executor.execute(&job, None, Duration::from_secs(30)).await.unwrap_err();
        assert!(matches!(
            err,
            ExecuteError::CapabilityUnavailable {
                kind: ConverterKind::Video
            }
        ));
        assert!(err.to_string().contains("capability unavailable"));
    }

    #[tokio::test]
    async fn test_empty_output_rejected_and_scratch_cleaned() {
        let (storage, work_dir, _temp) = harness().await;

        let mut job = test_job(Format::Jpg, Format::Png);
        job.source_artifact = format!("uploads/{}/input.jpg", job.id);
        storage
            .put_bytes(&job.source_artifact, b"fake jpeg")
            .await
            .unwrap();

        let executor = ConversionExecutor::new(storage.clone(), work_dir.clone())
            .with_converter(ConverterKind::Image, Arc::new(StubConverter { payload: b"" }));

        let err = executor.execute(&job, None, Duration::from_secs(30)).await.unwrap_err();
        assert!(matches!(
            err,
            ExecuteError::Converter(ConverterError::EmptyOutput { .. })
        ));
        assert!(!work_dir.join(&job.id).exists());
    }

    #[tokio::test]
    async fn test_converter_failure_cleans_scratch() {
        struct FailingConverter;

        #[async_trait]
        impl Converter for FailingConverter {
            fn name(&self) -> &str {
                "failing"
            }

            async fn convert(&self, _request: ConvertRequest) -> Result<PathBuf, ConverterError> {
                Err(ConverterError::conversion_failed("codec exploded", None))
            }

            async fn validate(&self) -> Result<(), ConverterError> {
                Ok(())
            }
        }

        let (storage, work_dir, _temp) = harness().await;

        let mut job = test_job(Format::Jpg, Format::Png);
        job.source_artifact = format!("uploads/{}/input.jpg", job.id);
        storage
            .put_bytes(&job.source_artifact, b"fake jpeg")
            .await
            .unwrap();

        let executor = ConversionExecutor::new(storage.clone(), work_dir.clone())
            .with_converter(ConverterKind::Image, Arc::new(FailingConverter));

        let err = executor.execute(&job, None, Duration::from_secs(30)).await.unwrap_err();
        assert!(err.to_string().contains("codec exploded"));
        assert!(!work_dir.join(&job.id).exists());
    }
}
