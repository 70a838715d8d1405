//! JSON error envelope for the REST surface.
//!
//! Every error becomes `{"detail": "<message>"}` with the matching HTTP
//! status; unhandled errors become a generic 500.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::kernel::jobs::SchedulerError;

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Unauthorized(String),
    NotFound(String),
    ServiceUnavailable(String),
    Internal(anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, detail) = match self {
            ApiError::BadRequest(detail) => (StatusCode::BAD_REQUEST, detail),
            ApiError::Unauthorized(detail) => (StatusCode::UNAUTHORIZED, detail),
            ApiError::NotFound(detail) => (StatusCode::NOT_FOUND, detail),
            ApiError::ServiceUnavailable(detail) => (StatusCode::SERVICE_UNAVAILABLE, detail),
            ApiError::Internal(error) => {
                tracing::error!(error = %error, "unhandled error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        (status, Json(json!({ "detail": detail }))).into_response()
    }
}

impl From<SchedulerError> for ApiError {
    fn from(err: SchedulerError) -> Self {
        if err.is_store_unavailable() {
            return ApiError::ServiceUnavailable("Database unavailable".to_string());
        }

        match err {
            SchedulerError::Validation(detail) => ApiError::BadRequest(detail),
            SchedulerError::NotFound => ApiError::NotFound("Job not found".to_string()),
            e @ SchedulerError::InvalidTransition { .. } => ApiError::BadRequest(e.to_string()),
            SchedulerError::Database(e) => ApiError::Internal(e.into()),
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        ApiError::Internal(err)
    }
}
