use std::sync::Arc;

use anyhow::Result;
use tracing::info;
use tracing_subscriber::EnvFilter;

use auth::{
    AppState, config::AuthConfig, repositories::PgSessionStore, routes,
    session::SessionManager,
};
use common::database::{self, DatabaseConfig};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    info!("Starting authentication service");

    let auth_config = AuthConfig::from_env()?;

    // Initialize database connection pool
    let db_config = DatabaseConfig::from_env()?;
    let pool = database::init_pool(&db_config).await?;

    if !database::health_check(&pool).await? {
        anyhow::bail!("Failed to connect to database");
    }
    info!("Database connection successful");

    let store = PgSessionStore::new(pool);
    store.migrate().await?;

    let manager = SessionManager::new(Arc::new(store), &auth_config);
    let app = routes::create_router(AppState::new(manager));

    let listener = tokio::net::TcpListener::bind(&auth_config.bind_addr).await?;
    info!("Authentication service listening on {}", auth_config.bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}
