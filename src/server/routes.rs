//! HTTP route handlers for the job API.
//!
//! Routes:
//! - POST /remove-background - Submit an image (multipart field `file`)
//! - GET /task/{task_id} - Poll job status
//! - GET /result/{task_id} - Download the processed PNG
//! - GET /health - Liveness check

use std::sync::Arc;

use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::header,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;

use super::error::{ApiError, ApiResult};
use super::state::AppState;
use crate::config::OutputFormat;
use crate::error::BgRemovalError;
use crate::jobs::{JobId, JobState};

/// Multipart field carrying the upload
pub const UPLOAD_FIELD: &str = "file";

/// Slack on top of the upload limit for multipart framing
const MULTIPART_OVERHEAD: usize = 1024 * 1024;

#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    pub task_id: String,
}

#[derive(Debug, Serialize)]
pub struct TaskStatusResponse {
    pub status: JobState,
    pub progress: u8,
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
    pub jobs: usize,
}

/// Unparseable ids cannot name a job, so they are reported as not found.
fn parse_task_id(raw: &str) -> Result<JobId, BgRemovalError> {
    raw.parse().map_err(|_| BgRemovalError::job_not_found(raw))
}

/// POST /remove-background - Accept an upload and start a job.
pub async fn remove_background(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> ApiResult<Json<SubmitResponse>> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }
        let filename = field.file_name().unwrap_or_default().to_string();
        let bytes = field.bytes().await?;

        let id = state.service.submit(bytes.to_vec(), &filename).await?;
        return Ok(Json(SubmitResponse {
            task_id: id.to_string(),
        }));
    }

    Err(ApiError::BadRequest(format!(
        "missing multipart field '{UPLOAD_FIELD}'"
    )))
}

/// GET /task/{task_id} - Current state of a job.
pub async fn task_status(
    State(state): State<Arc<AppState>>,
    Path(task_id): Path<String>,
) -> ApiResult<Json<TaskStatusResponse>> {
    let id = parse_task_id(&task_id)?;
    let snapshot = state.service.status(&id)?;
    Ok(Json(TaskStatusResponse {
        status: snapshot.state,
        progress: snapshot.progress,
        error: snapshot.error,
    }))
}

/// GET /result/{task_id} - The processed image of a completed job.
pub async fn task_result(
    State(state): State<Arc<AppState>>,
    Path(task_id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let id = parse_task_id(&task_id)?;
    let result = state.service.result(&id)?;

    let bytes = tokio::fs::read(&result.path).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            // Swept between the existence check and the read
            BgRemovalError::ResultMissing {
                id: task_id.clone(),
                path: result.path.display().to_string(),
            }
        } else {
            BgRemovalError::file_io_error("read result", &result.path, &e)
        }
    })?;

    let disposition = format!("attachment; filename=\"{}\"", result.download_name());
    Ok((
        [
            (header::CONTENT_TYPE, OutputFormat::Png.mime_type().to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    ))
}

/// GET /health - Health check endpoint.
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.uptime_secs(),
        jobs: state.service.store().len(),
    })
}

/// Create the job API router.
pub fn api_routes(state: Arc<AppState>) -> Router {
    let body_limit = state.service.config().max_file_size + MULTIPART_OVERHEAD;

    Router::new()
        .route(
            "/remove-background",
            post(remove_background).layer(DefaultBodyLimit::max(body_limit)),
        )
        .route("/task/{task_id}", get(task_status))
        .route("/result/{task_id}", get(task_result))
        .route("/health", get(health_check))
        .with_state(state)
}
