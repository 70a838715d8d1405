use anyhow::{Context, Result};
use dotenvy::dotenv;
use std::env;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    pub poll_interval_seconds: u64,
    pub stale_running_minutes: i64,
    pub execution_min_sleep: u64,
    pub execution_max_sleep: u64,
    pub failure_probability: f64,
    pub cron_secret: Option<String>,
    pub quote_api_url: String,
    pub api_title: String,
    pub api_version: String,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenv();

        Ok(Self {
            database_url: env::var("DATABASE_URL").context("DATABASE_URL must be set")?,
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .context("PORT must be a valid number")?,
            poll_interval_seconds: env::var("WORKER_POLL_INTERVAL_SECONDS")
                .unwrap_or_else(|_| "5".to_string())
                .parse()
                .context("WORKER_POLL_INTERVAL_SECONDS must be a valid number")?,
            stale_running_minutes: env::var("WORKER_STALE_RUNNING_MINUTES")
                .unwrap_or_else(|_| "10".to_string())
                .parse()
                .context("WORKER_STALE_RUNNING_MINUTES must be a valid number")?,
            execution_min_sleep: env::var("WORKER_EXECUTION_MIN_SLEEP")
                .unwrap_or_else(|_| "1".to_string())
                .parse()
                .context("WORKER_EXECUTION_MIN_SLEEP must be a valid number")?,
            execution_max_sleep: env::var("WORKER_EXECUTION_MAX_SLEEP")
                .unwrap_or_else(|_| "3".to_string())
                .parse()
                .context("WORKER_EXECUTION_MAX_SLEEP must be a valid number")?,
            failure_probability: env::var("WORKER_FAILURE_PROBABILITY")
                .unwrap_or_else(|_| "0.3".to_string())
                .parse()
                .context("WORKER_FAILURE_PROBABILITY must be a number between 0.0 and 1.0")?,
            cron_secret: env::var("CRON_SECRET").ok().filter(|s| !s.is_empty()),
            quote_api_url: env::var("QUOTE_API_URL")
                .unwrap_or_else(|_| "https://zenquotes.io/api/random".to_string()),
            api_title: env::var("API_TITLE")
                .unwrap_or_else(|_| "Job Scheduler & Execution Engine".to_string()),
            api_version: env::var("API_VERSION").unwrap_or_else(|_| "1.0.0".to_string()),
        })
    }
}
