//! Job API handlers.

use axum::{
    body::Body,
    extract::{Multipart, Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use morpho_core::{Job, JobStatus, ServiceError, SubmitRequest};

use crate::metrics::JOBS_CREATED_TOTAL;
use crate::state::AppState;

/// Maximum allowed limit for job listings
const MAX_LIMIT: i64 = 1000;

/// Default limit for job listings
const DEFAULT_LIMIT: i64 = 50;

// ============================================================================
// Request/Response Types
// ============================================================================

/// Query parameters for listing jobs
#[derive(Debug, Deserialize)]
pub struct ListJobsParams {
    /// Maximum number of jobs to return
    pub limit: Option<i64>,
}

/// Response for job operations
#[derive(Debug, Serialize)]
pub struct JobResponse {
    pub id: String,
    pub status: JobStatus,
    pub original_filename: String,
    pub source_format: String,
    pub target_format: String,
    pub category: String,
    pub source_size: u64,
    pub attempts: u32,
    pub created_at: String,
    pub updated_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processing_time_secs: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub converted_size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub download_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl From<Job> for JobResponse {
    fn from(job: Job) -> Self {
        let download_url = (job.status == JobStatus::Completed)
            .then(|| format!("/api/v1/jobs/{}/download", job.id));
        let processing_time_secs = job.processing_time_secs();

        Self {
            download_url,
            processing_time_secs,
            status: job.status,
            original_filename: job.original_filename,
            source_format: job.source_format.to_string(),
            target_format: job.target_format.to_string(),
            category: job.category.to_string(),
            source_size: job.source_size,
            attempts: job.attempts,
            created_at: job.created_at.to_rfc3339(),
            updated_at: job.updated_at.to_rfc3339(),
            completed_at: job.completed_at.map(|t| t.to_rfc3339()),
            converted_size: job.converted_size,
            checksum: job.checksum,
            error_message: job.error_message,
            id: job.id,
        }
    }
}

/// Response for listing jobs
#[derive(Debug, Serialize)]
pub struct ListJobsResponse {
    pub jobs: Vec<JobResponse>,
    pub total: i64,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct JobErrorResponse {
    pub error: String,
}

/// Maps service errors onto HTTP statuses.
pub struct ApiError(pub ServiceError);

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
            ServiceError::NotReady => StatusCode::CONFLICT,
            ServiceError::Validation(_) | ServiceError::Unsupported(_) => StatusCode::BAD_REQUEST,
            ServiceError::Job(_) | ServiceError::Storage(_) | ServiceError::Scheduler(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        (
            status,
            Json(JobErrorResponse {
                error: self.0.to_string(),
            }),
        )
            .into_response()
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// Accept a multipart upload and start a conversion
pub async fn create_job(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<JobResponse>), ApiError> {
    let mut filename: Option<String> = None;
    let mut bytes: Option<Vec<u8>> = None;
    let mut target_format: Option<String> = None;
    let mut category: Option<String> = None;

    while let Some(field) = multipart.next_field().await.map_err(|e| {
        ServiceError::Validation(format!("Malformed multipart body: {}", e))
    })? {
        let name = field.name().map(|n| n.to_string());
        match name.as_deref() {
            Some("file") => {
                filename = field.file_name().map(|n| n.to_string());
                let data = field.bytes().await.map_err(|e| {
                    ServiceError::Validation(format!("Failed to read upload: {}", e))
                })?;
                bytes = Some(data.to_vec());
            }
            Some("target_format") => {
                target_format = Some(field.text().await.map_err(|e| {
                    ServiceError::Validation(format!("Failed to read target_format: {}", e))
                })?);
            }
            Some("category") => {
                category = Some(field.text().await.map_err(|e| {
                    ServiceError::Validation(format!("Failed to read category: {}", e))
                })?);
            }
            _ => {}
        }
    }

    let (Some(filename), Some(bytes), Some(target_format)) = (filename, bytes, target_format)
    else {
        return Err(ServiceError::Validation(
            "Missing required fields: file, target_format".to_string(),
        )
        .into());
    };

    let job = state
        .service()
        .submit(SubmitRequest {
            filename,
            target_format,
            category,
            bytes,
        })
        .await?;

    JOBS_CREATED_TOTAL.inc();

    Ok((StatusCode::CREATED, Json(JobResponse::from(job))))
}

/// Get a job's status by id
pub async fn get_job(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<JobResponse>, ApiError> {
    let job = state.service().status(&id)?;
    Ok(Json(JobResponse::from(job)))
}

/// List recent jobs, newest first
pub async fn list_jobs(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListJobsParams>,
) -> Result<Json<ListJobsResponse>, ApiError> {
    let limit = params.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);

    let jobs = state.service().list_recent(limit)?;
    let total = state.service().total_count()?;

    Ok(Json(ListJobsResponse {
        jobs: jobs.into_iter().map(JobResponse::from).collect(),
        total,
    }))
}

/// Download the converted artifact
pub async fn download_job(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let (filename, bytes) = state.service().artifact(&id).await?;

    // RFC 5987 encoding keeps non-ASCII original filenames intact.
    let disposition = format!(
        "attachment; filename*=UTF-8''{}",
        urlencoding::encode(&filename)
    );

    let headers = [
        (header::CONTENT_TYPE, "application/octet-stream".to_string()),
        (header::CONTENT_DISPOSITION, disposition),
    ];

    Ok((StatusCode::OK, headers, Body::from(bytes)).into_response())
}

/// Delete a job and its artifacts
pub async fn delete_job(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.service().delete(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}
