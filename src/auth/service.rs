// Authentication service - business logic layer
//
// Session lifecycle per user:
//   Anonymous -> Authenticated (register/login)
//   Authenticated -> Authenticated (refresh, repeatable)
//   Authenticated -> Anonymous (logout)

use crate::auth::{
    error::AuthError,
    models::{AuthResponse, IdentityClaims, RegisterRequest, TokenPairResponse},
    password::PasswordService,
    store::RefreshTokenStore,
    token::{IssuedToken, TokenKind, TokenPair, TokenService},
};
use crate::db;
use crate::error::StoreError;
use crate::users::{NewUser, User, UserRepository, UserResponse};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use validator::Validate;

/// Default upper bound for a single store call
pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(5);

/// Authentication service coordinating all auth operations
pub struct AuthService {
    users: Arc<dyn UserRepository>,
    sessions: Arc<dyn RefreshTokenStore>,
    passwords: PasswordService,
    tokens: Arc<TokenService>,
    store_timeout: Duration,
}

impl AuthService {
    pub fn new(
        users: Arc<dyn UserRepository>,
        sessions: Arc<dyn RefreshTokenStore>,
        passwords: PasswordService,
        tokens: Arc<TokenService>,
    ) -> Self {
        Self {
            users,
            sessions,
            passwords,
            tokens,
            store_timeout: DEFAULT_STORE_TIMEOUT,
        }
    }

    pub fn with_store_timeout(mut self, store_timeout: Duration) -> Self {
        self.store_timeout = store_timeout;
        self
    }

    /// Register a new user and open a session for them
    pub async fn register(&self, request: RegisterRequest) -> Result<AuthResponse, AuthError> {
        request
            .validate()
            .map_err(|e| AuthError::Validation(format!("Validation failed: {}", e)))?;
        if request.password != request.confirm_password {
            return Err(AuthError::Validation("Passwords do not match".to_string()));
        }
        PasswordService::validate_password_strength(&request.password)?;

        if self
            .bounded("find_by_email", self.users.find_by_email(&request.email))
            .await?
            .is_some()
        {
            return Err(AuthError::Conflict("Email already exists".to_string()));
        }

        let password_hash = self.hash_password(request.password).await?;
        let user = self
            .bounded(
                "create_user",
                self.users.create(NewUser {
                    username: request.username,
                    email: request.email,
                    password_hash,
                }),
            )
            .await
            .map_err(|e| match e {
                StoreError::Conflict => {
                    AuthError::Conflict("Email or username already exists".to_string())
                }
                other => AuthError::Store(other),
            })?;

        // A registration that cannot open its session is undone
        let pair = match self.start_session(&user).await {
            Ok(pair) => pair,
            Err(e) => {
                self.discard_user(user.id).await;
                return Err(e);
            }
        };

        info!(user_id = user.id, "User registered");
        Ok(AuthResponse {
            user: UserResponse::from(user),
            access_token: pair.access.token,
            refresh_token: pair.refresh.token,
        })
    }

    /// Login a user
    ///
    /// An unknown email and a wrong password produce the same error and leave
    /// the session store untouched.
    pub async fn login(&self, email: &str, password: &str) -> Result<AuthResponse, AuthError> {
        let user = match self
            .bounded("find_by_email", self.users.find_by_email(email))
            .await?
        {
            Some(user) => user,
            None => {
                debug!("Login for unknown email");
                return Err(AuthError::InvalidCredentials);
            }
        };

        if !self
            .verify_password(password.to_string(), user.password_hash.clone())
            .await?
        {
            debug!(user_id = user.id, "Login with wrong password");
            return Err(AuthError::InvalidCredentials);
        }

        let pair = self.start_session(&user).await?;

        info!(user_id = user.id, "User logged in");
        Ok(AuthResponse {
            user: UserResponse::from(user),
            access_token: pair.access.token,
            refresh_token: pair.refresh.token,
        })
    }

    /// Exchange a refresh token for a new token pair, rotating the stored one
    ///
    /// The new pair carries the claims recovered from the presented token;
    /// profile changes made since then only show up after a fresh login.
    pub async fn refresh_tokens(&self, presented: &str) -> Result<TokenPairResponse, AuthError> {
        let claims = self.tokens.validate(TokenKind::Refresh, presented)?;

        if !self
            .bounded("is_valid", self.sessions.is_valid(presented))
            .await?
        {
            debug!(user_id = claims.user_id, "Refresh token not on record");
            return Err(AuthError::InvalidToken);
        }

        let pair = self.tokens.generate_token_pair(&claims)?;
        self.bounded(
            "rotate",
            self.sessions.rotate(
                claims.user_id,
                presented,
                &pair.refresh.token,
                pair.refresh.expires_at,
            ),
        )
        .await
        .map_err(|e| match e {
            StoreError::NotFound => AuthError::RotationFailed(e),
            other => AuthError::Store(other),
        })?;

        debug!(user_id = claims.user_id, "Refresh token rotated");
        Ok(TokenPairResponse {
            access_token: pair.access.token,
            refresh_token: pair.refresh.token,
        })
    }

    /// Drop the user's session; fails when there is none
    pub async fn logout(&self, user_id: i64) -> Result<(), AuthError> {
        self.bounded("delete", self.sessions.delete(user_id))
            .await
            .map_err(|e| match e {
                StoreError::NotFound => AuthError::NoActiveSession,
                other => AuthError::Store(other),
            })?;

        info!(user_id, "User logged out");
        Ok(())
    }

    /// Get current user information
    pub async fn current_user(&self, user_id: i64) -> Result<UserResponse, AuthError> {
        self.bounded("find_by_id", self.users.find_by_id(user_id))
            .await?
            .map(UserResponse::from)
            .ok_or_else(|| {
                warn!(user_id, "Valid access token for a missing user");
                AuthError::InvalidToken
            })
    }

    /// Remove the user's refresh record, if any
    ///
    /// Used when an account goes away; a missing record is not an error.
    pub async fn end_session(&self, user_id: i64) -> Result<(), StoreError> {
        match self.bounded("delete", self.sessions.delete(user_id)).await {
            Ok(()) | Err(StoreError::NotFound) => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// Mint a pair for the user as they are now and persist its refresh half
    async fn start_session(&self, user: &User) -> Result<TokenPair, AuthError> {
        let claims = IdentityClaims::for_user(user);
        let pair = self.tokens.generate_token_pair(&claims)?;
        self.open_session(user.id, &pair.refresh).await?;
        Ok(pair)
    }

    async fn discard_user(&self, user_id: i64) {
        match self.bounded("delete_user", self.users.delete(user_id)).await {
            Ok(()) => debug!(user_id, "Rolled back registration"),
            Err(e) => error!(user_id, "Failed to roll back registration: {}", e),
        }
    }

    /// Persist a freshly minted refresh token; a new login supersedes any
    /// session the user already had
    async fn open_session(&self, user_id: i64, refresh: &IssuedToken) -> Result<(), AuthError> {
        match self
            .bounded(
                "save",
                self.sessions.save(user_id, &refresh.token, refresh.expires_at),
            )
            .await
        {
            Ok(()) => Ok(()),
            Err(StoreError::Conflict) => {
                debug!(user_id, "Replacing existing session");
                self.bounded(
                    "replace",
                    self.sessions.replace(user_id, &refresh.token, refresh.expires_at),
                )
                .await?;
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn bounded<T, F>(&self, operation: &'static str, call: F) -> Result<T, StoreError>
    where
        F: Future<Output = Result<T, StoreError>>,
    {
        db::with_timeout(self.store_timeout, operation, call).await
    }

    async fn hash_password(&self, password: String) -> Result<String, AuthError> {
        let passwords = self.passwords.clone();
        tokio::task::spawn_blocking(move || passwords.hash_password(&password))
            .await
            .map_err(|e| {
                error!("Password hashing task failed: {}", e);
                AuthError::PasswordHash
            })?
    }

    async fn verify_password(&self, password: String, hash: String) -> Result<bool, AuthError> {
        let passwords = self.passwords.clone();
        tokio::task::spawn_blocking(move || passwords.verify_password(&password, &hash))
            .await
            .map_err(|e| {
                error!("Password verification task failed: {}", e);
                AuthError::PasswordHash
            })
    }
}
