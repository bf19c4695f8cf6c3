// src/error.rs

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::fmt;

/// Global Application Error Enum.
/// Centralizes error handling and mapping to HTTP responses.
#[derive(Debug)]
pub enum AppError {
    // 401 Unauthorized: no usable identity claim. Callers redirect to login.
    Unauthenticated,

    // 403 Forbidden: authenticated but lacking the capability or ownership.
    Forbidden,

    // 404 Not Found
    NotFound(String),

    // 422 Unprocessable Entity: reorder id set does not match the course's
    // current lesson id set.
    InvalidOrder(String),

    // 409 Conflict: attendee record already exists for (course, learner).
    AlreadyEnrolled,

    // 409 Conflict (e.g., duplicate username)
    Conflict(String),

    // 400 Bad Request: missing/invalid field, e.g. payment without price.
    Validation(String),

    // 500 Internal Server Error: storage-layer failure. Never retried for
    // mutating operations.
    Storage(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl std::error::Error for AppError {}

/// Implements `IntoResponse` for `AppError`.
/// Converts the error into a JSON response with appropriate HTTP status code.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::Unauthenticated => (
                StatusCode::UNAUTHORIZED,
                "Authentication required".to_string(),
            ),
            AppError::Forbidden => (StatusCode::FORBIDDEN, "Access denied".to_string()),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::InvalidOrder(msg) => (StatusCode::UNPROCESSABLE_ENTITY, msg),
            AppError::AlreadyEnrolled => (
                StatusCode::CONFLICT,
                "Learner is already enrolled in this course".to_string(),
            ),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Storage(msg) => {
                tracing::error!("Storage error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal Server Error".to_string(),
                )
            }
        };
        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

/// Converts `sqlx::Error` into `AppError::Storage`.
/// Allows using `?` operator on database queries.
impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Validation(err.to_string())
    }
}
