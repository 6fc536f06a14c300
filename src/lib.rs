pub mod app;
pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod users;

pub use app::{create_router, AppState};
