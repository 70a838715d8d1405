//! Job CRUD and status-control endpoints.

use axum::extract::{Extension, Path, Query};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::kernel::jobs::{Job, JobCreate, JobExecution, JobFilter, JobStatus};
use crate::server::app::AppState;
use crate::server::error::ApiError;

#[derive(Serialize)]
pub struct JobResponse {
    #[serde(flatten)]
    pub job: Job,
    pub executions: Vec<JobExecution>,
}

#[derive(Serialize)]
pub struct JobListResponse {
    pub jobs: Vec<JobResponse>,
    pub total: i64,
}

#[derive(Deserialize)]
pub struct JobUpdate {
    pub status: JobStatus,
}

pub async fn create_job(
    Extension(state): Extension<AppState>,
    Json(input): Json<JobCreate>,
) -> Result<Json<JobResponse>, ApiError> {
    let job = state.service.create(input).await?;

    Ok(Json(JobResponse {
        job,
        executions: Vec::new(),
    }))
}

pub async fn list_jobs(
    Extension(state): Extension<AppState>,
    Query(filter): Query<JobFilter>,
) -> Result<Json<JobListResponse>, ApiError> {
    let (jobs, total) = state.service.list(filter).await?;

    let ids: Vec<Uuid> = jobs.iter().map(|job| job.id).collect();
    let mut executions_by_job = state.service.executions_for(&ids).await?;

    let jobs = jobs
        .into_iter()
        .map(|job| {
            let executions = executions_by_job.remove(&job.id).unwrap_or_default();
            JobResponse { job, executions }
        })
        .collect();

    Ok(Json(JobListResponse { jobs, total }))
}

pub async fn get_job(
    Extension(state): Extension<AppState>,
    Path(job_id): Path<Uuid>,
) -> Result<Json<JobResponse>, ApiError> {
    let job = state.service.get(job_id).await?;
    let executions = state.service.executions(job_id).await?;

    Ok(Json(JobResponse { job, executions }))
}

pub async fn update_job_status(
    Extension(state): Extension<AppState>,
    Path(job_id): Path<Uuid>,
    Json(update): Json<JobUpdate>,
) -> Result<Json<JobResponse>, ApiError> {
    let job = state.service.update_status(job_id, update.status).await?;
    let executions = state.service.executions(job_id).await?;

    Ok(Json(JobResponse { job, executions }))
}

pub async fn delete_job(
    Extension(state): Extension<AppState>,
    Path(job_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    state.service.delete(job_id).await?;

    Ok(StatusCode::NO_CONTENT)
}
