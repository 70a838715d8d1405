//! Per-attempt execution records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "execution_status", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum ExecutionStatus {
    Success,
    Failed,
}

/// One attempt of a job's side effect. Inserted before the attempt runs,
/// finished (in the same transaction) once it terminates, so a failed
/// attempt is never silently dropped.
#[derive(FromRow, Debug, Clone, Serialize)]
pub struct JobExecution {
    pub id: Uuid,
    pub job_id: Uuid,
    pub attempt_number: i32,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub status: ExecutionStatus,
    pub error_message: Option<String>,
    pub result: Option<String>,
}

impl JobExecution {
    /// Insert the pessimistic attempt record: status starts FAILED and is
    /// only overwritten by an observed success.
    pub async fn insert(
        tx: &mut Transaction<'_, Postgres>,
        job_id: Uuid,
        attempt_number: i32,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Self>(
            r#"
            INSERT INTO job_executions (id, job_id, attempt_number, started_at, status)
            VALUES ($1, $2, $3, NOW(), 'FAILED')
            RETURNING id, job_id, attempt_number, started_at, finished_at,
                      status, error_message, result
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(job_id)
        .bind(attempt_number)
        .fetch_one(&mut **tx)
        .await
    }

    pub async fn finish(
        tx: &mut Transaction<'_, Postgres>,
        id: Uuid,
        status: ExecutionStatus,
        error_message: Option<&str>,
        result: Option<&str>,
        finished_at: DateTime<Utc>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE job_executions
            SET status = $2,
                error_message = $3,
                result = $4,
                finished_at = $5
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(status)
        .bind(error_message)
        .bind(result)
        .bind(finished_at)
        .execute(&mut **tx)
        .await?;

        Ok(())
    }

    pub async fn list_for_job(pool: &PgPool, job_id: Uuid) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>(
            r#"
            SELECT id, job_id, attempt_number, started_at, finished_at,
                   status, error_message, result
            FROM job_executions
            WHERE job_id = $1
            ORDER BY started_at ASC, attempt_number ASC
            "#,
        )
        .bind(job_id)
        .fetch_all(pool)
        .await
    }

    pub async fn list_for_jobs(pool: &PgPool, job_ids: &[Uuid]) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>(
            r#"
            SELECT id, job_id, attempt_number, started_at, finished_at,
                   status, error_message, result
            FROM job_executions
            WHERE job_id = ANY($1)
            ORDER BY started_at ASC, attempt_number ASC
            "#,
        )
        .bind(job_ids)
        .fetch_all(pool)
        .await
    }
}
