//! REST surface integration tests: CRUD, validation, control, cron, health.

mod common;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use chrono::{Duration as TimeDelta, Utc};
use common::{insert_ready_one_time, test_app, TestHarness};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use test_context::test_context;
use tower::ServiceExt;
use uuid::Uuid;

async fn request(
    app: &Router,
    method: &str,
    uri: &str,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(value) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(value.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };

    (status, value)
}

fn one_time_body(name: &str) -> Value {
    json!({
        "name": name,
        "schedule_type": "one_time",
        "run_at": (Utc::now() + TimeDelta::hours(1)).to_rfc3339(),
        "max_retries": 3,
    })
}

#[test_context(TestHarness)]
#[tokio::test]
async fn create_one_time_job(ctx: &mut TestHarness) {
    let app = test_app(&ctx.db_pool, None);

    let (status, body) = request(&app, "POST", "/api/jobs", Some(one_time_body("hello"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "hello");
    assert_eq!(body["status"], "SCHEDULED");
    assert_eq!(body["schedule_type"], "one_time");
    assert_eq!(body["retry_count"], 0);
    assert_eq!(body["version"], 1);
    assert_eq!(body["executions"], json!([]));
    assert!(body["id"].as_str().is_some());
}

#[test_context(TestHarness)]
#[tokio::test]
async fn create_rejects_invalid_submissions(ctx: &mut TestHarness) {
    let app = test_app(&ctx.db_pool, None);

    // interval without interval_seconds
    let (status, body) = request(
        &app,
        "POST",
        "/api/jobs",
        Some(json!({ "name": "bad", "schedule_type": "interval" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["detail"], "interval jobs require interval_seconds");

    // one_time with run_at in the past
    let (status, body) = request(
        &app,
        "POST",
        "/api/jobs",
        Some(json!({
            "name": "late",
            "schedule_type": "one_time",
            "run_at": (Utc::now() - TimeDelta::hours(1)).to_rfc3339(),
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["detail"], "run_at must be in the future");

    // one_time without run_at
    let (status, _) = request(
        &app,
        "POST",
        "/api/jobs",
        Some(json!({ "name": "when", "schedule_type": "one_time" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // retry budget out of range
    let mut body_json = one_time_body("greedy");
    body_json["max_retries"] = json!(101);
    let (status, body) = request(&app, "POST", "/api/jobs", Some(body_json)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["detail"], "max_retries must be between 0 and 100");
}

#[test_context(TestHarness)]
#[tokio::test]
async fn get_unknown_job_is_404(ctx: &mut TestHarness) {
    let app = test_app(&ctx.db_pool, None);

    let (status, body) = request(&app, "GET", &format!("/api/jobs/{}", Uuid::new_v4()), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["detail"], "Job not found");
}

#[test_context(TestHarness)]
#[tokio::test]
async fn list_jobs_filters_and_paginates(ctx: &mut TestHarness) {
    let app = test_app(&ctx.db_pool, None);

    for name in ["a", "b"] {
        let (status, _) = request(&app, "POST", "/api/jobs", Some(one_time_body(name))).await;
        assert_eq!(status, StatusCode::OK);
    }
    let (status, _) = request(
        &app,
        "POST",
        "/api/jobs",
        Some(json!({ "name": "c", "schedule_type": "interval", "interval_seconds": 60 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = request(&app, "GET", "/api/jobs", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 3);
    assert_eq!(body["jobs"].as_array().unwrap().len(), 3);

    let (_, body) = request(&app, "GET", "/api/jobs?schedule_type=interval", None).await;
    assert_eq!(body["total"], 1);
    assert_eq!(body["jobs"][0]["name"], "c");

    let (_, body) = request(&app, "GET", "/api/jobs?status=SCHEDULED", None).await;
    assert_eq!(body["total"], 3);

    let (_, body) = request(&app, "GET", "/api/jobs?status=COMPLETED", None).await;
    assert_eq!(body["total"], 0);

    // Pagination: page size applies, total does not shrink.
    let (_, body) = request(&app, "GET", "/api/jobs?limit=2&offset=0", None).await;
    assert_eq!(body["jobs"].as_array().unwrap().len(), 2);
    assert_eq!(body["total"], 3);

    let (status, body) = request(&app, "GET", "/api/jobs?limit=0", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["detail"], "limit must be between 1 and 500");

    let (status, _) = request(&app, "GET", "/api/jobs?limit=501", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[test_context(TestHarness)]
#[tokio::test]
async fn patch_walks_the_operator_transition_table(ctx: &mut TestHarness) {
    let app = test_app(&ctx.db_pool, None);

    let (_, created) = request(&app, "POST", "/api/jobs", Some(one_time_body("ctrl"))).await;
    let id = created["id"].as_str().unwrap().to_string();
    let uri = format!("/api/jobs/{}", id);

    // Pause, resume, cancel.
    let (status, body) = request(&app, "PATCH", &uri, Some(json!({ "status": "PAUSED" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "PAUSED");

    let (status, body) = request(&app, "PATCH", &uri, Some(json!({ "status": "SCHEDULED" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "SCHEDULED");

    // Operators cannot drive worker-owned transitions.
    let (status, body) = request(&app, "PATCH", &uri, Some(json!({ "status": "COMPLETED" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["detail"]
        .as_str()
        .unwrap()
        .contains("cannot transition"));

    let (status, _) = request(&app, "PATCH", &uri, Some(json!({ "status": "RUNNING" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = request(&app, "PATCH", &uri, Some(json!({ "status": "CANCELLED" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "CANCELLED");

    // Cancelled is terminal.
    let (status, _) = request(&app, "PATCH", &uri, Some(json!({ "status": "PAUSED" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = request(
        &app,
        "PATCH",
        &format!("/api/jobs/{}", Uuid::new_v4()),
        Some(json!({ "status": "PAUSED" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[test_context(TestHarness)]
#[tokio::test]
async fn delete_cascades_to_executions(ctx: &mut TestHarness) {
    let app = test_app(&ctx.db_pool, None);

    let job = insert_ready_one_time(&ctx.db_pool, "doomed", 3).await;
    sqlx::query(
        "INSERT INTO job_executions (id, job_id, attempt_number, status) VALUES ($1, $2, 1, 'FAILED')",
    )
    .bind(Uuid::new_v4())
    .bind(job.id)
    .execute(&ctx.db_pool)
    .await
    .unwrap();

    let uri = format!("/api/jobs/{}", job.id);
    let (status, _) = request(&app, "DELETE", &uri, None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = request(&app, "GET", &uri, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let orphans: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM job_executions WHERE job_id = $1")
            .bind(job.id)
            .fetch_one(&ctx.db_pool)
            .await
            .unwrap();
    assert_eq!(orphans, 0);

    let (status, _) = request(&app, "DELETE", &uri, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[test_context(TestHarness)]
#[tokio::test]
async fn job_responses_embed_execution_history(ctx: &mut TestHarness) {
    let app = test_app(&ctx.db_pool, None);

    let job = insert_ready_one_time(&ctx.db_pool, "storied", 3).await;
    sqlx::query(
        "INSERT INTO job_executions (id, job_id, attempt_number, status, error_message) \
         VALUES ($1, $2, 1, 'FAILED', 'boom')",
    )
    .bind(Uuid::new_v4())
    .bind(job.id)
    .execute(&ctx.db_pool)
    .await
    .unwrap();

    let (status, body) = request(&app, "GET", &format!("/api/jobs/{}", job.id), None).await;
    assert_eq!(status, StatusCode::OK);
    let executions = body["executions"].as_array().unwrap();
    assert_eq!(executions.len(), 1);
    assert_eq!(executions[0]["attempt_number"], 1);
    assert_eq!(executions[0]["status"], "FAILED");
    assert_eq!(executions[0]["error_message"], "boom");

    let (_, body) = request(&app, "GET", "/api/jobs", None).await;
    assert_eq!(body["jobs"][0]["executions"].as_array().unwrap().len(), 1);
}

#[test_context(TestHarness)]
#[tokio::test]
async fn health_endpoints_answer(ctx: &mut TestHarness) {
    let app = test_app(&ctx.db_pool, None);

    let (status, body) = request(&app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "status": "ok" }));

    let (status, body) = request(&app, "GET", "/health/db", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["db"], "connected");
}

#[test_context(TestHarness)]
#[tokio::test]
async fn cron_trigger_requires_configuration_and_secret(ctx: &mut TestHarness) {
    // No secret configured: the trigger is unavailable.
    let app = test_app(&ctx.db_pool, None);
    let (status, _) = request(&app, "POST", "/api/cron/execute-pending-jobs", None).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

    // Configured: the header must match.
    let app = test_app(&ctx.db_pool, Some("s3cret".to_string()));
    let (status, body) = request(&app, "POST", "/api/cron/execute-pending-jobs", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["detail"], "Invalid or missing X-Cron-Secret");

    let wrong = Request::builder()
        .method("POST")
        .uri("/api/cron/execute-pending-jobs")
        .header("X-Cron-Secret", "nope")
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(wrong).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[test_context(TestHarness)]
#[tokio::test]
async fn cron_trigger_processes_pending_jobs(ctx: &mut TestHarness) {
    let app = test_app(&ctx.db_pool, Some("s3cret".to_string()));
    let job = insert_ready_one_time(&ctx.db_pool, "cron-fodder", 3).await;

    let authorized = Request::builder()
        .method("POST")
        .uri("/api/cron/execute-pending-jobs")
        .header("X-Cron-Secret", "s3cret")
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(authorized).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["ok"], true);
    assert_eq!(body["stale_reset"], 0);
    assert_eq!(body["jobs_processed"], 1);

    let (_, fetched) = request(&app, "GET", &format!("/api/jobs/{}", job.id), None).await;
    assert_eq!(fetched["status"], "COMPLETED");
}
