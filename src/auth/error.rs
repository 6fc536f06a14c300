// Authentication error types

use crate::auth::token::TokenError;
use crate::error::StoreError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::{debug, error, warn};

/// Errors surfaced by the authentication workflow
///
/// Token failures collapse into `InvalidToken` whatever the cause, and an
/// unknown email is reported exactly like a wrong password.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Missing authentication token")]
    MissingToken,

    #[error("Conflict: {0}")]
    Conflict(String),

    /// The server-side record changed between validation and rotation
    #[error("Refresh token rotation failed: {0}")]
    RotationFailed(#[source] StoreError),

    #[error("No active session")]
    NoActiveSession,

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Password hashing error")]
    PasswordHash,

    #[error("Token generation error: {0}")]
    TokenGeneration(String),
}

impl From<TokenError> for AuthError {
    fn from(error: TokenError) -> Self {
        match error {
            TokenError::Encoding(msg) => AuthError::TokenGeneration(msg),
            _ => AuthError::InvalidToken,
        }
    }
}

impl AuthError {
    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::Validation(_) => StatusCode::BAD_REQUEST,
            AuthError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            AuthError::InvalidToken => StatusCode::UNAUTHORIZED,
            AuthError::MissingToken => StatusCode::UNAUTHORIZED,
            AuthError::Conflict(_) => StatusCode::CONFLICT,
            AuthError::RotationFailed(StoreError::NotFound) => StatusCode::CONFLICT,
            AuthError::RotationFailed(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AuthError::NoActiveSession => StatusCode::NOT_FOUND,
            AuthError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AuthError::PasswordHash => StatusCode::INTERNAL_SERVER_ERROR,
            AuthError::TokenGeneration(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message that is safe to send to clients
    pub fn error_message(&self) -> String {
        match self {
            AuthError::Validation(msg) => msg.clone(),
            AuthError::Conflict(msg) => msg.clone(),
            AuthError::RotationFailed(StoreError::NotFound) => {
                "Refresh token could not be rotated".to_string()
            }
            AuthError::InvalidCredentials
            | AuthError::InvalidToken
            | AuthError::MissingToken
            | AuthError::NoActiveSession => self.to_string(),
            AuthError::RotationFailed(_)
            | AuthError::Store(_)
            | AuthError::PasswordHash
            | AuthError::TokenGeneration(_) => "Internal server error".to_string(),
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        match &self {
            AuthError::InvalidToken => warn!("Invalid token attempt"),
            AuthError::MissingToken => warn!("Missing token in request"),
            AuthError::InvalidCredentials => warn!("Failed login attempt"),
            AuthError::RotationFailed(StoreError::NotFound) => {
                warn!("Refresh token rotated or revoked concurrently")
            }
            AuthError::RotationFailed(e) | AuthError::Store(e) => {
                error!("Store error in auth: {:?}", e)
            }
            AuthError::PasswordHash => error!("Password hashing error"),
            AuthError::TokenGeneration(msg) => error!("Token generation error: {}", msg),
            AuthError::Validation(_) | AuthError::Conflict(_) | AuthError::NoActiveSession => {
                debug!("Auth request rejected: {}", self)
            }
        }

        let body = Json(json!({
            "error": self.error_message(),
        }));

        (self.status_code(), body).into_response()
    }
}
