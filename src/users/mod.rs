// User accounts: persistence and CRUD endpoints

pub mod handlers;
pub mod models;
pub mod repository;

pub use models::{NewUser, UpdateUserRequest, User, UserResponse};
pub use repository::{InMemoryUserRepository, PgUserRepository, UserRepository};
