// HTTP handlers for user endpoints

use crate::app::AppState;
use crate::auth::middleware::AuthenticatedUser;
use crate::db::with_timeout;
use crate::error::{ApiError, StoreError};
use crate::users::{UpdateUserRequest, UserResponse};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use validator::Validate;

fn user_not_found(id: i64) -> ApiError {
    ApiError::NotFound {
        resource: "User".to_string(),
        id: id.to_string(),
    }
}

fn ensure_self(user: &AuthenticatedUser, id: i64) -> Result<(), ApiError> {
    if user.user_id != id {
        return Err(ApiError::Forbidden(format!(
            "User {} cannot modify user {}",
            user.user_id, id
        )));
    }
    Ok(())
}

/// Handler for GET /users
#[utoipa::path(
    get,
    path = "/users",
    responses(
        (status = 200, description = "All users", body = Vec<UserResponse>),
        (status = 401, description = "Missing or invalid access token")
    ),
    security(("bearer_auth" = [])),
    tag = "users"
)]
pub async fn list_users_handler(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
) -> Result<Json<Vec<UserResponse>>, ApiError> {
    let users = with_timeout(state.store_timeout, "list_users", state.users.list()).await?;
    tracing::debug!("Retrieved {} users", users.len());
    Ok(Json(users.into_iter().map(UserResponse::from).collect()))
}

/// Handler for GET /users/:id
#[utoipa::path(
    get,
    path = "/users/{id}",
    params(
        ("id" = i64, Path, description = "User ID")
    ),
    responses(
        (status = 200, description = "User found", body = UserResponse),
        (status = 401, description = "Missing or invalid access token"),
        (status = 404, description = "User not found")
    ),
    security(("bearer_auth" = [])),
    tag = "users"
)]
pub async fn get_user_handler(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<Json<UserResponse>, ApiError> {
    let user = with_timeout(state.store_timeout, "find_by_id", state.users.find_by_id(id))
        .await?
        .ok_or_else(|| user_not_found(id))?;

    Ok(Json(user.into()))
}

/// Handler for PATCH /users/:id
/// Only the account owner may change their username or email
#[utoipa::path(
    patch,
    path = "/users/{id}",
    params(
        ("id" = i64, Path, description = "User ID")
    ),
    request_body = UpdateUserRequest,
    responses(
        (status = 200, description = "User updated", body = UserResponse),
        (status = 400, description = "Invalid input"),
        (status = 403, description = "Not the account owner"),
        (status = 409, description = "Username or email taken")
    ),
    security(("bearer_auth" = [])),
    tag = "users"
)]
pub async fn update_user_handler(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
    Json(request): Json<UpdateUserRequest>,
) -> Result<Json<UserResponse>, ApiError> {
    ensure_self(&user, id)?;
    request.validate()?;

    let updated = with_timeout(state.store_timeout, "update_user", state.users.update(id, request))
        .await
        .map_err(|e| match e {
            // A valid token for an account that no longer exists
            StoreError::NotFound => ApiError::Unauthorized("Account no longer exists".to_string()),
            StoreError::Conflict => ApiError::Conflict {
                message: "Username or email already exists".to_string(),
            },
            other => ApiError::DatabaseError(other),
        })?;

    tracing::info!("Updated user {}", id);
    Ok(Json(updated.into()))
}

/// Handler for DELETE /users/:id
/// Removes the account together with its session
#[utoipa::path(
    delete,
    path = "/users/{id}",
    params(
        ("id" = i64, Path, description = "User ID")
    ),
    responses(
        (status = 204, description = "User deleted"),
        (status = 403, description = "Not the account owner"),
        (status = 404, description = "User not found")
    ),
    security(("bearer_auth" = [])),
    tag = "users"
)]
pub async fn delete_user_handler(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    ensure_self(&user, id)?;

    state.auth.end_session(id).await?;
    with_timeout(state.store_timeout, "delete_user", state.users.delete(id))
        .await
        .map_err(|e| match e {
            StoreError::NotFound => user_not_found(id),
            other => ApiError::DatabaseError(other),
        })?;

    tracing::info!("Deleted user {}", id);
    Ok(StatusCode::NO_CONTENT)
}
