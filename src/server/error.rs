//! Mapping of service errors onto HTTP responses.

use axum::{
    extract::multipart::MultipartError,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::error::BgRemovalError;
use crate::jobs::JobState;

/// Structured JSON error response for API errors
#[derive(Debug, Serialize)]
#[cfg_attr(test, derive(serde::Deserialize))]
pub struct ErrorResponse {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    /// Job state, for results requested before completion
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<JobState>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<u8>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            details: None,
            status: None,
            progress: None,
        }
    }

    pub fn with_details(error: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            details: Some(details.into()),
            ..Self::new(error)
        }
    }
}

/// API error types that map to HTTP status codes
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Service(#[from] BgRemovalError),

    #[error("Multipart error: {0}")]
    Multipart(#[from] MultipartError),

    #[error("Bad request: {0}")]
    BadRequest(String),
}

impl ApiError {
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Service(e) => match e {
                BgRemovalError::FormatUnsupported(_) | BgRemovalError::InvalidImage(_) => {
                    StatusCode::BAD_REQUEST
                },
                BgRemovalError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
                BgRemovalError::JobNotFound(_) => StatusCode::NOT_FOUND,
                BgRemovalError::ResultNotReady { .. } => StatusCode::CONFLICT,
                BgRemovalError::ResultMissing { .. } => StatusCode::GONE,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ApiError::Multipart(e) => e.status(),
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = match &self {
            ApiError::Service(BgRemovalError::JobNotFound(id)) => {
                tracing::debug!(task_id = %id, "Task not found");
                ErrorResponse::with_details("Task not found", format!("Task ID: {}", id))
            },
            ApiError::Service(BgRemovalError::ResultNotReady { id, state, progress }) => {
                tracing::debug!(task_id = %id, %state, progress, "Result requested early");
                ErrorResponse {
                    status: Some(*state),
                    progress: Some(*progress),
                    ..ErrorResponse::with_details("Task not completed", self.to_string())
                }
            },
            ApiError::Service(BgRemovalError::ResultMissing { id, path }) => {
                tracing::warn!(task_id = %id, path = %path, "Result file missing");
                ErrorResponse::with_details("Result file not found", format!("Task ID: {}", id))
            },
            ApiError::Service(e) if e.is_client_error() => {
                tracing::info!(error = %e, "Rejected upload");
                ErrorResponse::new(e.to_string())
            },
            ApiError::Service(e) => {
                tracing::error!(error = %e, "Internal error");
                ErrorResponse::with_details("Internal server error", e.to_string())
            },
            ApiError::Multipart(e) => {
                tracing::info!(error = %e, "Malformed upload");
                if status == StatusCode::PAYLOAD_TOO_LARGE {
                    ErrorResponse::with_details("File too large", e.body_text())
                } else {
                    ErrorResponse::with_details("Invalid upload", e.body_text())
                }
            },
            ApiError::BadRequest(msg) => {
                tracing::info!(message = %msg, "Bad request");
                ErrorResponse::with_details("Bad request", msg.clone())
            },
        };

        (status, Json(body)).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn extract_error_response(response: Response) -> (StatusCode, ErrorResponse) {
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let error_response: ErrorResponse = serde_json::from_slice(&body).unwrap();
        (status, error_response)
    }

    #[tokio::test]
    async fn test_unsupported_format_is_bad_request() {
        let error = ApiError::from(BgRemovalError::unsupported_format(".gif"));
        let (status, body) = extract_error_response(error.into_response()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body.error.contains(".gif"));
    }

    #[tokio::test]
    async fn test_payload_too_large() {
        let error = ApiError::from(BgRemovalError::PayloadTooLarge { size: 11, limit: 10 });
        let (status, _) = extract_error_response(error.into_response()).await;
        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn test_not_found() {
        let error = ApiError::from(BgRemovalError::job_not_found("abc"));
        let (status, body) = extract_error_response(error.into_response()).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body.error, "Task not found");
        assert_eq!(body.details, Some("Task ID: abc".to_string()));
    }

    #[tokio::test]
    async fn test_not_ready_carries_state() {
        let error = ApiError::from(BgRemovalError::ResultNotReady {
            id: "abc".to_string(),
            state: JobState::Processing,
            progress: 10,
        });
        let (status, body) = extract_error_response(error.into_response()).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body.status, Some(JobState::Processing));
        assert_eq!(body.progress, Some(10));
    }

    #[tokio::test]
    async fn test_missing_result_is_gone() {
        let error = ApiError::from(BgRemovalError::ResultMissing {
            id: "abc".to_string(),
            path: "temp/output_abc.png".to_string(),
        });
        let (status, _) = extract_error_response(error.into_response()).await;
        assert_eq!(status, StatusCode::GONE);
    }

    #[tokio::test]
    async fn test_internal_error() {
        let error = ApiError::from(BgRemovalError::unexpected("boom"));
        let (status, body) = extract_error_response(error.into_response()).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body.error, "Internal server error");
    }

    #[test]
    fn test_error_response_skips_empty_fields() {
        let json = serde_json::to_string(&ErrorResponse::new("x")).unwrap();
        assert_eq!(json, r#"{"error":"x"}"#);
    }
}
