// Authentication module
// Token issuance, refresh token rotation and the login/logout workflow

pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod password;
pub mod service;
pub mod store;
pub mod token;

pub use error::AuthError;
pub use middleware::AuthenticatedUser;
pub use models::{AuthResponse, IdentityClaims, LoginRequest, RefreshRequest, RegisterRequest, Role};
pub use password::{HashCost, PasswordService};
pub use service::AuthService;
pub use store::{InMemoryRefreshTokenStore, PgRefreshTokenStore, RefreshTokenStore};
pub use token::{JwtConfig, TokenService};
