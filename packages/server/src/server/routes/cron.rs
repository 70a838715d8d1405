//! External trigger endpoint: run pending jobs on demand.
//!
//! Called by an external scheduler (for example a periodic GitHub Actions
//! workflow) with the shared secret in `X-Cron-Secret`.

use axum::extract::Extension;
use axum::http::HeaderMap;
use axum::Json;
use serde::Serialize;

use crate::server::app::AppState;
use crate::server::error::ApiError;

const CRON_SECRET_HEADER: &str = "x-cron-secret";
const CRON_MAX_JOBS: u64 = 10;

#[derive(Serialize)]
pub struct CronRunResponse {
    pub ok: bool,
    pub stale_reset: u64,
    pub jobs_processed: u64,
}

/// Run one tick: crash recovery plus up to ten pending jobs.
pub async fn execute_pending_jobs(
    Extension(state): Extension<AppState>,
    headers: HeaderMap,
) -> Result<Json<CronRunResponse>, ApiError> {
    let Some(secret) = state.cron_secret.as_deref() else {
        return Err(ApiError::ServiceUnavailable(
            "Cron not configured: set CRON_SECRET in environment".to_string(),
        ));
    };

    let presented = headers
        .get(CRON_SECRET_HEADER)
        .and_then(|value| value.to_str().ok());
    if presented != Some(secret) {
        return Err(ApiError::Unauthorized(
            "Invalid or missing X-Cron-Secret".to_string(),
        ));
    }

    let (stale_reset, jobs_processed) = state.worker.run_pending(CRON_MAX_JOBS).await?;

    Ok(Json(CronRunResponse {
        ok: true,
        stale_reset,
        jobs_processed,
    }))
}
