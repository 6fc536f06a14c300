// User data models and DTOs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use validator::{Validate, ValidationError};

/// User database model
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Fields needed to create a user; the password is already hashed
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
}

/// User response model (excludes password_hash)
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserResponse {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

/// Partial profile update; omitted fields keep their current value
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
#[validate(schema(function = "validate_has_changes", skip_on_field_errors = false))]
pub struct UpdateUserRequest {
    #[validate(length(min = 1, max = 50, message = "Username must be 1-50 characters"))]
    pub username: Option<String>,
    #[validate(email(message = "Email must be a valid address"))]
    pub email: Option<String>,
}

impl UpdateUserRequest {
    pub fn is_empty(&self) -> bool {
        self.username.is_none() && self.email.is_none()
    }
}

fn validate_has_changes(request: &UpdateUserRequest) -> Result<(), ValidationError> {
    if request.is_empty() {
        let mut error = ValidationError::new("empty_update");
        error.message = Some("At least one of username or email is required".into());
        return Err(error);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn response_omits_password_hash() {
        let user = User {
            id: 7,
            username: "alice".to_string(),
            email: "alice@example.com".to_string(),
            password_hash: "$argon2id$secret".to_string(),
            created_at: Utc::now(),
            updated_at: None,
        };

        let json = serde_json::to_value(UserResponse::from(user)).unwrap();
        assert_eq!(json["id"], 7);
        assert!(json.get("password_hash").is_none());
    }

    #[test]
    fn empty_update_is_invalid() {
        assert!(UpdateUserRequest::default().validate().is_err());
    }

    #[test]
    fn partial_update_validates_present_fields() {
        let ok = UpdateUserRequest {
            username: Some("alice_w".to_string()),
            email: None,
        };
        assert!(ok.validate().is_ok());

        let bad_email = UpdateUserRequest {
            username: None,
            email: Some("nope".to_string()),
        };
        assert!(bad_email.validate().is_err());
    }
}
