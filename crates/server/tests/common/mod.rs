//! Common test utilities for E2E testing with a mocked converter.
//!
//! Builds the full server stack in-process (real store, storage, scheduler
//! and service; converter mocked) so API behavior can be exercised without
//! any conversion tooling installed.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use morpho_core::{
    config::LimitsConfig, testing::MockConverter, ArtifactStore, Config, ConversionExecutor,
    ConversionService, ConverterKind, FsArtifactStore, JobScheduler, JobStore, ProgressPublisher,
    SchedulerConfig, SqliteJobStore,
};
use morpho_server::state::AppState;

const MULTIPART_BOUNDARY: &str = "test-boundary-7MA4YWxkTrZu0gW";

/// Test fixture for E2E testing with a mock converter.
pub struct TestFixture {
    /// The Axum router for testing
    pub router: Router,
    /// Mock converter serving every capability - script failures here
    pub converter: MockConverter,
    /// The scheduler, already started
    pub scheduler: Arc<JobScheduler>,
    /// Temporary directory backing storage and the database
    pub temp_dir: TempDir,
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
}

impl TestFixture {
    /// Create a new test fixture with fast scheduler settings.
    pub async fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let db_path = temp_dir.path().join("test.db");

        let store: Arc<dyn JobStore> =
            Arc::new(SqliteJobStore::new(&db_path).expect("Failed to create job store"));
        let storage: Arc<dyn ArtifactStore> = Arc::new(
            FsArtifactStore::new(temp_dir.path().join("artifacts"))
                .await
                .expect("Failed to create artifact store"),
        );

        let converter = MockConverter::new();
        let executor = Arc::new(
            ConversionExecutor::new(Arc::clone(&storage), temp_dir.path().join("work"))
                .with_converter(ConverterKind::Image, Arc::new(converter.clone()))
                .with_converter(ConverterKind::Document, Arc::new(converter.clone()))
                .with_converter(ConverterKind::Video, Arc::new(converter.clone())),
        );

        let publisher = Arc::new(ProgressPublisher::default());
        let scheduler_config = SchedulerConfig {
            workers: 2,
            retry_delay_secs: 0,
            ..Default::default()
        };
        let scheduler = Arc::new(JobScheduler::new(
            scheduler_config.clone(),
            Arc::clone(&store),
            executor,
            Arc::clone(&publisher),
            Arc::clone(&storage),
        ));
        scheduler.start().await;

        let service = Arc::new(ConversionService::new(
            store,
            storage,
            Arc::clone(&scheduler),
            publisher,
            LimitsConfig::default(),
        ));

        let mut config = Config::default();
        config.scheduler = scheduler_config;

        let state = Arc::new(AppState::new(config, service, Arc::clone(&scheduler)));
        let router = morpho_server::api::create_router(state);

        Self {
            router,
            converter,
            scheduler,
            temp_dir,
        }
    }

    /// Send a GET request to the test server.
    pub async fn get(&self, path: &str) -> TestResponse {
        let request = Request::builder()
            .method("GET")
            .uri(path)
            .body(Body::empty())
            .unwrap();
        self.send(request).await
    }

    /// Send a DELETE request.
    pub async fn delete(&self, path: &str) -> TestResponse {
        let request = Request::builder()
            .method("DELETE")
            .uri(path)
            .body(Body::empty())
            .unwrap();
        self.send(request).await
    }

    /// Upload a file through the multipart endpoint.
    pub async fn upload(
        &self,
        filename: &str,
        target_format: &str,
        file_bytes: &[u8],
    ) -> TestResponse {
        let mut body = Vec::new();
        body.extend_from_slice(
            format!(
                "--{b}\r\nContent-Disposition: form-data; name=\"target_format\"\r\n\r\n{target}\r\n",
                b = MULTIPART_BOUNDARY,
                target = target_format
            )
            .as_bytes(),
        );
        body.extend_from_slice(
            format!(
                "--{b}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{name}\"\r\n\
                 Content-Type: application/octet-stream\r\n\r\n",
                b = MULTIPART_BOUNDARY,
                name = filename
            )
            .as_bytes(),
        );
        body.extend_from_slice(file_bytes);
        body.extend_from_slice(format!("\r\n--{}--\r\n", MULTIPART_BOUNDARY).as_bytes());

        let request = Request::builder()
            .method("POST")
            .uri("/api/v1/jobs")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", MULTIPART_BOUNDARY),
            )
            .body(Body::from(body))
            .unwrap();
        self.send(request).await
    }

    /// Fetch a raw (non-JSON) response body.
    pub async fn get_raw(&self, path: &str) -> (StatusCode, Vec<u8>) {
        let request = Request::builder()
            .method("GET")
            .uri(path)
            .body(Body::empty())
            .unwrap();
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, bytes.to_vec())
    }

    /// Poll a job until it reaches the expected status string.
    pub async fn wait_for_status(&self, job_id: &str, expected: &str) -> bool {
        for _ in 0..100 {
            let response = self.get(&format!("/api/v1/jobs/{}", job_id)).await;
            if response.body["status"] == expected {
                return true;
            }
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        }
        false
    }

    async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        TestResponse { status, body }
    }
}
