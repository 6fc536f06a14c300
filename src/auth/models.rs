// Authentication data models and DTOs

use crate::users::{User, UserResponse};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use utoipa::ToSchema;
use validator::Validate;

/// Role carried in token claims
///
/// Every account currently gets `User`; nothing enforces roles yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Admin,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Admin => write!(f, "admin"),
        }
    }
}

/// Identity embedded in every issued token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityClaims {
    pub user_id: i64,
    pub email: String,
    pub role: Role,
}

impl IdentityClaims {
    /// Claims for a user as they look right now, with the default role
    pub fn for_user(user: &User) -> Self {
        Self {
            user_id: user.id,
            email: user.email.clone(),
            role: Role::default(),
        }
    }
}

/// Refresh token database model
///
/// Only the SHA-256 digest of the token is kept.
#[derive(Debug, Clone, FromRow)]
pub struct RefreshTokenRecord {
    pub id: i64,
    pub user_id: i64,
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// Registration request DTO
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct RegisterRequest {
    #[validate(length(min = 1, max = 50, message = "Username must be 1-50 characters"))]
    pub username: String,
    #[validate(email(message = "Email must be a valid address"))]
    pub email: String,
    pub password: String,
    pub confirm_password: String,
}

/// Login request DTO
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct LoginRequest {
    #[validate(email(message = "Email must be a valid address"))]
    pub email: String,
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

/// Token refresh request DTO
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct RefreshRequest {
    #[validate(length(min = 1, message = "Refresh token is required"))]
    pub refresh_token: String,
}

/// Authentication response DTO
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AuthResponse {
    pub user: UserResponse,
    pub access_token: String,
    pub refresh_token: String,
}

/// Response DTO for a successful refresh
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TokenPairResponse {
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Role::User).unwrap(), "\"user\"");
        assert_eq!(serde_json::from_str::<Role>("\"admin\"").unwrap(), Role::Admin);
        assert_eq!(Role::default(), Role::User);
    }

    #[test]
    fn register_request_validation() {
        let valid = RegisterRequest {
            username: "alice".to_string(),
            email: "alice@example.com".to_string(),
            password: "pass1234".to_string(),
            confirm_password: "pass1234".to_string(),
        };
        assert!(valid.validate().is_ok());

        let bad_email = RegisterRequest {
            email: "not-an-email".to_string(),
            ..valid.clone()
        };
        assert!(bad_email.validate().is_err());

        let empty_username = RegisterRequest {
            username: String::new(),
            ..valid
        };
        assert!(empty_username.validate().is_err());
    }
}
