//! Application setup and router assembly.

use std::sync::Arc;

use axum::extract::Extension;
use axum::routing::{get, post};
use axum::Router;
use sqlx::PgPool;
use tower_http::trace::TraceLayer;

use crate::kernel::jobs::{ActionRunner, JobService, JobWorker, WorkerConfig};
use crate::server::routes::{
    create_job, delete_job, execute_pending_jobs, get_job, health_db_handler, health_handler,
    list_jobs, update_job_status,
};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub db_pool: PgPool,
    pub service: JobService,
    pub worker: Arc<JobWorker>,
    pub cron_secret: Option<String>,
}

/// Build the axum application router.
///
/// The worker held by the state only runs when the cron trigger fires;
/// resident workers are separate processes (the `worker` bin).
pub fn build_app(
    pool: PgPool,
    runner: Arc<dyn ActionRunner>,
    worker_config: WorkerConfig,
    cron_secret: Option<String>,
) -> Router {
    let state = AppState {
        db_pool: pool.clone(),
        service: JobService::new(pool.clone()),
        worker: Arc::new(JobWorker::with_config(pool, runner, worker_config)),
        cron_secret,
    };

    let api = Router::new()
        .route("/jobs", post(create_job).get(list_jobs))
        .route(
            "/jobs/:job_id",
            get(get_job).patch(update_job_status).delete(delete_job),
        )
        .route("/cron/execute-pending-jobs", post(execute_pending_jobs));

    Router::new()
        .nest("/api", api)
        .route("/health", get(health_handler))
        .route("/health/db", get(health_db_handler))
        .layer(Extension(state))
        .layer(TraceLayer::new_for_http())
}
