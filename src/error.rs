//! Error type returned by every handler and service call.
//!
//! Each variant maps to one machine-readable `error` kind and one HTTP status.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::auth::repo::StoreError;

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Malformed or weak input (400).
    #[error("validation failed: {} field error(s)", .0.len())]
    Validation(Vec<FieldError>),

    /// Bad credentials, missing/invalid/expired token (401).
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Current password did not match during a password change (400).
    #[error("current password is incorrect")]
    WrongPassword,

    /// Authenticated but lacking the admin role (403).
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Duplicate email (409).
    #[error("conflict: {0}")]
    Conflict(String),

    /// Self-lockout attempt (400).
    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("internal error: {0}")]
    Internal(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

/// Body of every error response.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<FieldError>>,
}

impl ApiError {
    pub fn invalid_credentials() -> Self {
        ApiError::Unauthorized("Invalid credentials".into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) | ApiError::WrongPassword | ApiError::InvalidOperation(_) => {
                StatusCode::BAD_REQUEST
            }
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ApiError::Validation(_) => "validation_error",
            ApiError::Unauthorized(_) | ApiError::WrongPassword => "authentication_error",
            ApiError::Forbidden(_) => "forbidden",
            ApiError::Conflict(_) => "conflict",
            ApiError::InvalidOperation(_) => "invalid_operation",
            ApiError::NotFound(_) => "not_found",
            ApiError::Internal(_) => "internal_error",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let error = self.kind().to_string();
        let (message, details) = match self {
            ApiError::Validation(errors) => ("Request validation failed".to_string(), Some(errors)),
            ApiError::WrongPassword => ("Current password is incorrect.".to_string(), None),
            ApiError::Internal(msg) => {
                tracing::error!(error = %msg, "internal error");
                ("An internal error occurred".to_string(), None)
            }
            ApiError::Unauthorized(msg)
            | ApiError::Forbidden(msg)
            | ApiError::Conflict(msg)
            | ApiError::InvalidOperation(msg)
            | ApiError::NotFound(msg) => (msg, None),
        };

        (
            status,
            Json(ErrorResponse {
                error,
                message,
                details,
            }),
        )
            .into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::DuplicateEmail => {
                ApiError::Conflict("A user with this email already exists.".into())
            }
            StoreError::NotFound => ApiError::NotFound("User not found".into()),
            other => ApiError::Internal(other.to_string()),
        }
    }
}
