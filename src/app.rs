// Router, shared state and OpenAPI document

use crate::auth::{
    self,
    models::{
        AuthResponse, LoginRequest, MessageResponse, RefreshRequest, RegisterRequest, Role,
        TokenPairResponse,
    },
    AuthError, AuthService, PasswordService, RefreshTokenStore, TokenService,
};
use crate::config::AppConfig;
use crate::users::{self, UpdateUserRequest, UserRepository, UserResponse};
use axum::{
    extract::FromRef,
    response::Json,
    routing::{get, post},
    Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

/// OpenAPI documentation structure
#[derive(OpenApi)]
#[openapi(
    paths(
        auth::handlers::register_handler,
        auth::handlers::login_handler,
        auth::handlers::refresh_handler,
        auth::handlers::logout_handler,
        auth::handlers::profile_handler,
        users::handlers::list_users_handler,
        users::handlers::get_user_handler,
        users::handlers::update_user_handler,
        users::handlers::delete_user_handler,
    ),
    components(
        schemas(
            RegisterRequest,
            LoginRequest,
            RefreshRequest,
            AuthResponse,
            TokenPairResponse,
            MessageResponse,
            UserResponse,
            UpdateUserRequest,
            Role
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "auth", description = "Registration, login and token lifecycle"),
        (name = "users", description = "User account management")
    ),
    info(
        title = "Auth Service API",
        version = "1.0.0",
        description = "User authentication with rotating refresh tokens"
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub auth: Arc<AuthService>,
    pub users: Arc<dyn UserRepository>,
    pub tokens: Arc<TokenService>,
    /// Upper bound for each repository call made outside `AuthService`
    pub store_timeout: Duration,
}

impl FromRef<AppState> for Arc<TokenService> {
    fn from_ref(state: &AppState) -> Self {
        state.tokens.clone()
    }
}

impl AppState {
    pub fn new(
        users: Arc<dyn UserRepository>,
        sessions: Arc<dyn RefreshTokenStore>,
        passwords: PasswordService,
        tokens: TokenService,
        store_timeout: Duration,
    ) -> Self {
        let tokens = Arc::new(tokens);
        let auth = AuthService::new(users.clone(), sessions, passwords, tokens.clone())
            .with_store_timeout(store_timeout);

        Self {
            auth: Arc::new(auth),
            users,
            tokens,
            store_timeout,
        }
    }

    /// Build state from loaded configuration over the given stores
    pub fn from_config(
        config: &AppConfig,
        users: Arc<dyn UserRepository>,
        sessions: Arc<dyn RefreshTokenStore>,
    ) -> Result<Self, AuthError> {
        let passwords = PasswordService::with_cost(config.hash_cost)?;
        Ok(Self::new(
            users,
            sessions,
            passwords,
            TokenService::new(config.jwt.clone()),
            config.store_timeout,
        ))
    }
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// Create the application router with all routes and middleware
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .route("/health", get(health))
        .route("/auth/register", post(auth::handlers::register_handler))
        .route("/auth/login", post(auth::handlers::login_handler))
        .route("/auth/refresh-token", post(auth::handlers::refresh_handler))
        .route("/auth/logout", post(auth::handlers::logout_handler))
        .route("/auth/profile", get(auth::handlers::profile_handler))
        .route("/users", get(users::handlers::list_users_handler))
        .route(
            "/users/:id",
            get(users::handlers::get_user_handler)
                .patch(users::handlers::update_user_handler)
                .delete(users::handlers::delete_user_handler),
        )
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}
