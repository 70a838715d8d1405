//! Scripted action runners and job factories for tests.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use chrono::Utc;
use scheduler_core::kernel::jobs::{
    ActionOutcome, ActionRunner, Job, JobStatus, JobWorker, ScheduleType, WorkerConfig,
};
use scheduler_core::server::build_app;
use sqlx::PgPool;
use uuid::Uuid;

/// Runner with a fixed outcome and an optional artificial delay.
pub struct ScriptedRunner {
    pub success: bool,
    pub message: String,
    pub delay: Duration,
}

impl ScriptedRunner {
    pub fn succeeding() -> Self {
        Self {
            success: true,
            message: "done".to_string(),
            delay: Duration::ZERO,
        }
    }

    pub fn failing() -> Self {
        Self {
            success: false,
            message: "boom".to_string(),
            delay: Duration::ZERO,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

#[async_trait]
impl ActionRunner for ScriptedRunner {
    async fn run(&self, _job: &Job, _attempt: i32) -> ActionOutcome {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.success {
            ActionOutcome::success(self.message.clone())
        } else {
            ActionOutcome::failure(self.message.clone())
        }
    }
}

pub fn worker_with(pool: &PgPool, runner: impl ActionRunner + 'static) -> JobWorker {
    JobWorker::new(pool.clone(), Arc::new(runner))
}

/// Build the REST app with a scripted runner behind the cron trigger.
pub fn test_app(pool: &PgPool, cron_secret: Option<String>) -> Router {
    build_app(
        pool.clone(),
        Arc::new(ScriptedRunner::succeeding()),
        WorkerConfig::default(),
        cron_secret,
    )
}

/// Insert a one-time job that is already eligible (run_at in the past),
/// bypassing the API-level future-run_at validation.
pub async fn insert_ready_one_time(pool: &PgPool, name: &str, max_retries: i32) -> Job {
    let now = Utc::now();
    let job = Job {
        id: Uuid::new_v4(),
        name: name.to_string(),
        payload: None,
        schedule_type: ScheduleType::OneTime,
        run_at: Some(now - chrono::Duration::seconds(1)),
        interval_seconds: None,
        max_retries,
        retry_count: 0,
        status: JobStatus::Scheduled,
        created_at: now,
        updated_at: now,
        version: 1,
    };

    job.insert(pool).await.expect("insert job")
}

/// Insert an interval job with no run_at: immediately eligible, nulls-first.
pub async fn insert_interval(pool: &PgPool, name: &str, interval_seconds: i32) -> Job {
    let now = Utc::now();
    let job = Job {
        id: Uuid::new_v4(),
        name: name.to_string(),
        payload: None,
        schedule_type: ScheduleType::Interval,
        run_at: None,
        interval_seconds: Some(interval_seconds),
        max_retries: 3,
        retry_count: 0,
        status: JobStatus::Scheduled,
        created_at: now,
        updated_at: now,
        version: 1,
    };

    job.insert(pool).await.expect("insert job")
}
