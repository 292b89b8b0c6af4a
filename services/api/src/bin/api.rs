//! services/api/src/bin/api.rs

use api_lib::{
    adapters::{DbAdapter, LocalImageStorage},
    config::Config,
    error::ApiError,
    web::{router, AppState},
};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting server...");

    // --- 2. Connect to Database & Run Migrations ---
    info!("Connecting to database...");
    let db_pool = PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .connect(&config.database_url)
        .await?;
    let db_adapter = Arc::new(DbAdapter::new(db_pool, config.token_ttl_days));
    info!("Running database migrations...");
    db_adapter.run_migrations().await?;
    info!("Database migrations complete.");

    // --- 3. Prepare Image Storage ---
    tokio::fs::create_dir_all(&config.storage_path).await?;
    let images = Arc::new(LocalImageStorage::new(config.storage_path.clone()));
    info!(path = %config.storage_path.display(), "Image storage ready");

    // --- 4. Build the Shared AppState ---
    let app_state = Arc::new(AppState::new(
        config.clone(),
        db_adapter.clone(),
        db_adapter.clone(),
        db_adapter.clone(),
        db_adapter.clone(),
        db_adapter,
        images,
    ));

    // --- 5. Create the Web Router ---
    let app = router(app_state);

    // --- 6. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
