use auth_service::{
    auth::{InMemoryRefreshTokenStore, PgRefreshTokenStore, RefreshTokenStore},
    config::AppConfig,
    create_router, db,
    users::{InMemoryUserRepository, PgUserRepository, UserRepository},
    AppState,
};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// How often expired refresh tokens are purged
const SESSION_CLEANUP_INTERVAL: Duration = Duration::from_secs(60 * 60);

fn spawn_session_cleanup(sessions: Arc<dyn RefreshTokenStore>) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(SESSION_CLEANUP_INTERVAL);
        loop {
            interval.tick().await;
            match sessions.delete_expired().await {
                Ok(0) => tracing::debug!("No expired refresh tokens to purge"),
                Ok(purged) => tracing::info!("Purged {} expired refresh tokens", purged),
                Err(e) => tracing::error!("Failed to purge expired refresh tokens: {}", e),
            }
        }
    });
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
    tracing::info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .with_level(true)
        .init();

    tracing::info!("Auth service - Starting...");

    let config = AppConfig::from_env()?;
    tracing::debug!("Loaded configuration: {:?}", config);

    let (users, sessions): (Arc<dyn UserRepository>, Arc<dyn RefreshTokenStore>) =
        match &config.database_url {
            Some(database_url) => {
                tracing::info!("Connecting to database...");
                let pool = db::create_pool(database_url, config.store_timeout).await?;
                db::run_migrations(&pool).await?;
                let users: Arc<dyn UserRepository> = Arc::new(PgUserRepository::new(pool.clone()));
                let sessions: Arc<dyn RefreshTokenStore> = Arc::new(PgRefreshTokenStore::new(pool));
                (users, sessions)
            }
            None => {
                tracing::warn!("DATABASE_URL not set; users and sessions are kept in memory only");
                let users: Arc<dyn UserRepository> = Arc::new(InMemoryUserRepository::new());
                let sessions: Arc<dyn RefreshTokenStore> = Arc::new(InMemoryRefreshTokenStore::new());
                (users, sessions)
            }
        };

    spawn_session_cleanup(sessions.clone());

    let state = AppState::from_config(&config, users, sessions)?;
    let app = create_router(state);

    let addr = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("Auth service is running on http://{}", addr);
    tracing::info!("Swagger UI available at http://{}/swagger-ui", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}
