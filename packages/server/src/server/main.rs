// Main entry point for the scheduler API server

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use scheduler_core::kernel::jobs::{ExecutionSettings, HttpActionRunner, WorkerConfig};
use scheduler_core::server::build_app;
use scheduler_core::Config;
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,scheduler_core=debug,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env().context("Failed to load configuration")?;
    tracing::info!("Starting {} v{}", config.api_title, config.api_version);

    // Connect to database
    tracing::info!("Connecting to database...");
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.database_url)
        .await
        .context("Failed to connect to database")?;
    tracing::info!("Database connected");

    // Run migrations
    tracing::info!("Running database migrations...");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("Failed to run migrations")?;
    tracing::info!("Migrations complete");

    // Build the action runner shared by cron-triggered ticks
    let runner = Arc::new(
        HttpActionRunner::new(ExecutionSettings {
            min_sleep_secs: config.execution_min_sleep,
            max_sleep_secs: config.execution_max_sleep,
            failure_probability: config.failure_probability,
            quote_api_url: config.quote_api_url.clone(),
        })
        .context("Failed to build HTTP client")?,
    );

    let worker_config = WorkerConfig {
        poll_interval: Duration::from_secs(config.poll_interval_seconds),
        stale_running_minutes: config.stale_running_minutes,
        ..WorkerConfig::default()
    };

    let app = build_app(pool, runner, worker_config, config.cron_secret.clone());

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("Listening on {}", addr);
    tracing::info!("Health check: http://localhost:{}/health", config.port);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}
