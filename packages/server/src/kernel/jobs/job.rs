//! Job model: status enums, transition rules, and the `jobs` table SQL.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use uuid::Uuid;

// ============================================================================
// Enums
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "schedule_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ScheduleType {
    OneTime,
    Interval,
}

impl fmt::Display for ScheduleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ScheduleType::OneTime => "one_time",
            ScheduleType::Interval => "interval",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, Default)]
#[sqlx(type_name = "job_status", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum JobStatus {
    #[default]
    Scheduled,
    Running,
    Paused,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    /// Terminal statuses are never exited.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled
        )
    }

    /// Full transition table, worker- and operator-driven edges combined.
    pub fn can_transition_to(self, to: JobStatus) -> bool {
        use JobStatus::*;
        matches!(
            (self, to),
            (Scheduled, Running)
                | (Running, Completed)
                | (Running, Scheduled)
                | (Running, Failed)
                | (Scheduled, Paused)
                | (Paused, Scheduled)
                | (Scheduled, Cancelled)
                | (Paused, Cancelled)
                | (Running, Cancelled)
        )
    }

    /// The subset an operator may request through the API. Worker-owned
    /// edges (claiming, completion, rescheduling) are excluded.
    pub fn operator_can_transition(self, to: JobStatus) -> bool {
        use JobStatus::*;
        matches!(
            (self, to),
            (Scheduled, Paused)
                | (Paused, Scheduled)
                | (Scheduled, Cancelled)
                | (Paused, Cancelled)
                | (Running, Cancelled)
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            JobStatus::Scheduled => "SCHEDULED",
            JobStatus::Running => "RUNNING",
            JobStatus::Paused => "PAUSED",
            JobStatus::Completed => "COMPLETED",
            JobStatus::Failed => "FAILED",
            JobStatus::Cancelled => "CANCELLED",
        })
    }
}

// ============================================================================
// Job Model
// ============================================================================

#[derive(FromRow, Debug, Clone, Serialize)]
pub struct Job {
    pub id: Uuid,
    pub name: String,
    pub payload: Option<serde_json::Value>,
    pub schedule_type: ScheduleType,

    // Next moment this job is eligible; NULL means immediately eligible.
    pub run_at: Option<DateTime<Utc>>,
    pub interval_seconds: Option<i32>,

    pub max_retries: i32,
    pub retry_count: i32,

    pub status: JobStatus,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    // Reserved for optimistic concurrency should the lock strategy weaken.
    pub version: i32,
}

impl Job {
    pub async fn insert(&self, pool: &PgPool) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Self>(
            r#"
            INSERT INTO jobs (
                id, name, payload, schedule_type, run_at, interval_seconds,
                max_retries, retry_count, status, created_at, updated_at, version
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING id, name, payload, schedule_type, run_at, interval_seconds,
                      max_retries, retry_count, status, created_at, updated_at, version
            "#,
        )
        .bind(self.id)
        .bind(&self.name)
        .bind(&self.payload)
        .bind(self.schedule_type)
        .bind(self.run_at)
        .bind(self.interval_seconds)
        .bind(self.max_retries)
        .bind(self.retry_count)
        .bind(self.status)
        .bind(self.created_at)
        .bind(self.updated_at)
        .bind(self.version)
        .fetch_one(pool)
        .await
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>(
            r#"
            SELECT id, name, payload, schedule_type, run_at, interval_seconds,
                   max_retries, retry_count, status, created_at, updated_at, version
            FROM jobs
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    /// List jobs newest-first with optional status / schedule-type filters,
    /// returning the page and the unpaginated total.
    pub async fn list(
        pool: &PgPool,
        status: Option<JobStatus>,
        schedule_type: Option<ScheduleType>,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<Self>, i64), sqlx::Error> {
        let total = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*)
            FROM jobs
            WHERE ($1::job_status IS NULL OR status = $1)
              AND ($2::schedule_type IS NULL OR schedule_type = $2)
            "#,
        )
        .bind(status)
        .bind(schedule_type)
        .fetch_one(pool)
        .await?;

        let jobs = sqlx::query_as::<_, Self>(
            r#"
            SELECT id, name, payload, schedule_type, run_at, interval_seconds,
                   max_retries, retry_count, status, created_at, updated_at, version
            FROM jobs
            WHERE ($1::job_status IS NULL OR status = $1)
              AND ($2::schedule_type IS NULL OR schedule_type = $2)
            ORDER BY created_at DESC
            LIMIT $3 OFFSET $4
            "#,
        )
        .bind(status)
        .bind(schedule_type)
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await?;

        Ok((jobs, total))
    }

    /// Compare-and-set status update: only applies when the row still holds
    /// the status the caller validated against, so a write that waited on a
    /// worker's row lock cannot drag a job out of a terminal status.
    pub async fn update_status(
        pool: &PgPool,
        id: Uuid,
        from: JobStatus,
        to: JobStatus,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>(
            r#"
            UPDATE jobs
            SET status = $3,
                updated_at = NOW()
            WHERE id = $1 AND status = $2
            RETURNING id, name, payload, schedule_type, run_at, interval_seconds,
                      max_retries, retry_count, status, created_at, updated_at, version
            "#,
        )
        .bind(id)
        .bind(from)
        .bind(to)
        .fetch_optional(pool)
        .await
    }

    pub async fn delete(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM jobs WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Claim one ready job inside the caller's transaction.
    ///
    /// `FOR UPDATE SKIP LOCKED` makes rows claimed by other transactions
    /// invisible here, so N workers pull from the same table without
    /// duplicates and without blocking each other. The row lock is held
    /// until the caller commits or rolls back. Jobs with no `run_at` sort
    /// first and are picked promptly.
    pub async fn claim_one(tx: &mut Transaction<'_, Postgres>) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>(
            r#"
            SELECT id, name, payload, schedule_type, run_at, interval_seconds,
                   max_retries, retry_count, status, created_at, updated_at, version
            FROM jobs
            WHERE status = 'SCHEDULED'
              AND (run_at IS NULL OR run_at <= NOW())
            ORDER BY run_at ASC NULLS FIRST
            LIMIT 1
            FOR UPDATE SKIP LOCKED
            "#,
        )
        .fetch_optional(&mut **tx)
        .await
    }

    /// Crash recovery sweep: any RUNNING job whose last touch predates the
    /// threshold lost its worker; pull it back into the eligible pool.
    pub async fn reset_stale_running(
        pool: &PgPool,
        threshold: DateTime<Utc>,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE jobs
            SET status = 'SCHEDULED',
                updated_at = NOW()
            WHERE status = 'RUNNING'
              AND updated_at < $1
            "#,
        )
        .bind(threshold)
        .execute(pool)
        .await?;

        Ok(result.rows_affected())
    }

    pub async fn mark_running(
        tx: &mut Transaction<'_, Postgres>,
        id: Uuid,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE jobs SET status = 'RUNNING', updated_at = NOW() WHERE id = $1")
            .bind(id)
            .execute(&mut **tx)
            .await?;

        Ok(())
    }

    /// Re-read the row's status inside the claiming transaction.
    pub async fn current_status(
        tx: &mut Transaction<'_, Postgres>,
        id: Uuid,
    ) -> Result<Option<JobStatus>, sqlx::Error> {
        sqlx::query_scalar::<_, JobStatus>("SELECT status FROM jobs WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut **tx)
            .await
    }

    pub async fn complete(tx: &mut Transaction<'_, Postgres>, id: Uuid) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE jobs SET status = 'COMPLETED', updated_at = NOW() WHERE id = $1")
            .bind(id)
            .execute(&mut **tx)
            .await?;

        Ok(())
    }

    /// Successful interval cycle: back to SCHEDULED at the next occurrence,
    /// with the retry budget restored.
    pub async fn reschedule_interval(
        tx: &mut Transaction<'_, Postgres>,
        id: Uuid,
        next_run_at: DateTime<Utc>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE jobs
            SET status = 'SCHEDULED',
                run_at = $2,
                retry_count = 0,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(next_run_at)
        .execute(&mut **tx)
        .await?;

        Ok(())
    }

    /// Failed attempt with retries remaining: back to SCHEDULED, `run_at`
    /// untouched (no backoff in this design).
    pub async fn reschedule_retry(
        tx: &mut Transaction<'_, Postgres>,
        id: Uuid,
        retry_count: i32,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE jobs
            SET status = 'SCHEDULED',
                retry_count = $2,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(retry_count)
        .execute(&mut **tx)
        .await?;

        Ok(())
    }

    pub async fn mark_failed(
        tx: &mut Transaction<'_, Postgres>,
        id: Uuid,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE jobs SET status = 'FAILED', updated_at = NOW() WHERE id = $1")
            .bind(id)
            .execute(&mut **tx)
            .await?;

        Ok(())
    }
}
