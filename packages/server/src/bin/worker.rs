// Resident worker: crash recovery + claim-and-execute poll loop

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use scheduler_core::kernel::jobs::{ExecutionSettings, HttpActionRunner, JobWorker, WorkerConfig};
use scheduler_core::Config;
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,scheduler_core=debug,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env().context("Failed to load configuration")?;

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await
        .context("Failed to connect to database")?;

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

    let worker = JobWorker::with_config(pool, runner, worker_config);
    worker.run_until_shutdown().await
}
