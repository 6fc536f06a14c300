// Error handling module for the auth service
// Provides the storage error shared by all repositories and the API error
// returned by the user CRUD handlers

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use chrono::Utc;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, error, warn};

/// Failure of a persistence operation
///
/// Both the user repository and the refresh token store report through this
/// type so the workflow can tell "no such row" apart from "storage is down".
#[derive(Debug, Error)]
pub enum StoreError {
    /// Zero rows matched the operation
    #[error("record not found")]
    NotFound,

    /// A uniqueness constraint was violated
    #[error("record already exists")]
    Conflict,

    /// The operation did not complete within the configured budget
    #[error("store operation '{0}' timed out")]
    Timeout(&'static str),

    /// Underlying database failure
    #[error("database error: {0}")]
    Database(#[source] sqlx::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(error: sqlx::Error) -> Self {
        match &error {
            sqlx::Error::RowNotFound => StoreError::NotFound,
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => StoreError::Conflict,
            _ => StoreError::Database(error),
        }
    }
}

/// Error type for the user CRUD endpoints
/// All user handlers return Result<T, ApiError>
#[derive(Debug)]
pub enum ApiError {
    /// Validation errors from request validation
    /// Maps to HTTP 400 Bad Request
    ValidationError(validator::ValidationErrors),

    /// Resource not found by ID
    /// Maps to HTTP 404 Not Found
    NotFound { resource: String, id: String },

    /// Duplicate resource conflict
    /// Maps to HTTP 409 Conflict
    Conflict { message: String },

    /// Storage failures, details are kept out of client responses
    /// Maps to HTTP 500 Internal Server Error
    DatabaseError(StoreError),

    /// Maps to HTTP 401 Unauthorized
    Unauthorized(String),

    /// Maps to HTTP 403 Forbidden
    Forbidden(String),
}

/// Consistent error response structure
///
/// Carries a machine-readable `error_code` next to the human-readable
/// `message`. Fields follow snake_case naming.
#[derive(Serialize)]
pub struct ErrorResponse {
    /// Machine-readable error code (e.g., "VALIDATION_ERROR", "NOT_FOUND")
    pub error_code: String,

    /// Human-readable error message
    pub message: String,

    /// Optional additional details (e.g., field-level validation errors)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,

    /// RFC 3339 timestamp of when the error occurred
    pub timestamp: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_response) = self.to_error_response();
        (status, Json(error_response)).into_response()
    }
}

impl ApiError {
    fn to_error_response(&self) -> (StatusCode, ErrorResponse) {
        let (error_code, message, details) = match self {
            ApiError::ValidationError(errors) => {
                debug!("Validation error: {:?}", errors);
                (
                    "VALIDATION_ERROR",
                    "Request validation failed".to_string(),
                    Some(serde_json::to_value(errors).unwrap_or(serde_json::json!({}))),
                )
            }
            ApiError::NotFound { resource, id } => {
                debug!("Resource not found: {} with id {}", resource, id);
                ("NOT_FOUND", format!("{} with id {} not found", resource, id), None)
            }
            ApiError::Conflict { message } => {
                warn!("Conflict error: {}", message);
                ("CONFLICT", message.clone(), None)
            }
            ApiError::DatabaseError(store_error) => {
                // Full detail stays in the logs
                error!("Database error: {:?}", store_error);
                ("DATABASE_ERROR", "A database error occurred".to_string(), None)
            }
            ApiError::Unauthorized(message) => {
                warn!("Unauthorized access attempt: {}", message);
                ("UNAUTHORIZED", message.clone(), None)
            }
            ApiError::Forbidden(message) => {
                warn!("Forbidden access attempt: {}", message);
                ("FORBIDDEN", message.clone(), None)
            }
        };

        (
            self.status_code(),
            ErrorResponse {
                error_code: error_code.to_string(),
                message,
                details,
                timestamp: Utc::now().to_rfc3339(),
            },
        )
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::ValidationError(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound { .. } => StatusCode::NOT_FOUND,
            ApiError::Conflict { .. } => StatusCode::CONFLICT,
            ApiError::DatabaseError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(error: StoreError) -> Self {
        ApiError::DatabaseError(error)
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(errors: validator::ValidationErrors) -> Self {
        ApiError::ValidationError(errors)
    }
}
