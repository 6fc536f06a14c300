// Authentication extractor for protected routes

use crate::auth::{error::AuthError, models::Role, token::TokenService};
use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts},
};
use std::sync::Arc;
use tracing::debug;

/// Identity recovered from a valid `Authorization: Bearer <access token>` header
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub user_id: i64,
    pub email: String,
    pub role: Role,
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthenticatedUser
where
    Arc<TokenService>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get(header::AUTHORIZATION)
            .ok_or(AuthError::MissingToken)?
            .to_str()
            .map_err(|_| AuthError::InvalidToken)?;

        let token = auth_header.strip_prefix("Bearer ").ok_or_else(|| {
            debug!(path = %parts.uri.path(), "Authorization header without Bearer prefix");
            AuthError::InvalidToken
        })?;

        let tokens = Arc::<TokenService>::from_ref(state);
        let claims = tokens.validate_access_token(token)?;

        Ok(AuthenticatedUser {
            user_id: claims.user_id,
            email: claims.email,
            role: claims.role,
        })
    }
}
