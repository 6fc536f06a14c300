// HTTP handlers for authentication endpoints

use crate::app::AppState;
use crate::auth::{
    error::AuthError,
    middleware::AuthenticatedUser,
    models::{
        AuthResponse, LoginRequest, MessageResponse, RefreshRequest, RegisterRequest,
        TokenPairResponse,
    },
};
use crate::users::UserResponse;
use axum::{extract::State, http::StatusCode, Json};
use validator::Validate;

/// Register a new user
/// POST /auth/register
#[utoipa::path(
    post,
    path = "/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "User registered", body = AuthResponse),
        (status = 400, description = "Invalid input", body = String, example = json!({"error": "Passwords do not match"})),
        (status = 409, description = "Email already registered", body = String, example = json!({"error": "Email already exists"}))
    ),
    tag = "auth"
)]
pub async fn register_handler(
    State(state): State<AppState>,
    Json(request): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), AuthError> {
    tracing::debug!("Registration attempt for {}", request.email);

    let response = state.auth.register(request).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

/// Login a user
/// POST /auth/login
#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = AuthResponse),
        (status = 400, description = "Invalid input", body = String, example = json!({"error": "Validation failed"})),
        (status = 401, description = "Invalid credentials", body = String, example = json!({"error": "Invalid email or password"}))
    ),
    tag = "auth"
)]
pub async fn login_handler(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, AuthError> {
    request
        .validate()
        .map_err(|e| AuthError::Validation(format!("Validation failed: {}", e)))?;

    let response = state.auth.login(&request.email, &request.password).await?;
    Ok(Json(response))
}

/// Rotate a refresh token into a new token pair
/// POST /auth/refresh-token
#[utoipa::path(
    post,
    path = "/auth/refresh-token",
    request_body = RefreshRequest,
    responses(
        (status = 200, description = "Tokens rotated", body = TokenPairResponse),
        (status = 401, description = "Invalid or revoked refresh token", body = String, example = json!({"error": "Invalid token"})),
        (status = 409, description = "Session changed during rotation", body = String, example = json!({"error": "Refresh token could not be rotated"}))
    ),
    tag = "auth"
)]
pub async fn refresh_handler(
    State(state): State<AppState>,
    Json(request): Json<RefreshRequest>,
) -> Result<Json<TokenPairResponse>, AuthError> {
    request
        .validate()
        .map_err(|e| AuthError::Validation(format!("Validation failed: {}", e)))?;

    let pair = state.auth.refresh_tokens(&request.refresh_token).await?;
    Ok(Json(pair))
}

/// End the caller's session
/// POST /auth/logout
#[utoipa::path(
    post,
    path = "/auth/logout",
    responses(
        (status = 200, description = "Logged out", body = MessageResponse),
        (status = 401, description = "Missing or invalid access token", body = String, example = json!({"error": "Invalid token"})),
        (status = 404, description = "No active session", body = String, example = json!({"error": "No active session"}))
    ),
    security(("bearer_auth" = [])),
    tag = "auth"
)]
pub async fn logout_handler(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<MessageResponse>, AuthError> {
    state.auth.logout(user.user_id).await?;
    Ok(Json(MessageResponse {
        message: "Logged out successfully".to_string(),
    }))
}

/// Get current user information
/// GET /auth/profile
#[utoipa::path(
    get,
    path = "/auth/profile",
    responses(
        (status = 200, description = "Current user", body = UserResponse),
        (status = 401, description = "Missing or invalid access token", body = String, example = json!({"error": "Missing authentication token"}))
    ),
    security(("bearer_auth" = [])),
    tag = "auth"
)]
pub async fn profile_handler(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<UserResponse>, AuthError> {
    let profile = state.auth.current_user(user.user_id).await?;
    Ok(Json(profile))
}
