//! Job submission, query, and control operations.
//!
//! These are the transport-agnostic Scheduler API operations the REST layer
//! sits on. Each call runs against its own pool-scoped connection; the only
//! coordination with workers is the brief row lock held by a status update.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use sqlx::PgPool;
use uuid::Uuid;

use super::error::SchedulerError;
use super::execution::JobExecution;
use super::job::{Job, JobStatus, ScheduleType};

pub const MAX_NAME_LEN: usize = 500;
pub const MAX_RETRIES_LIMIT: i32 = 100;
pub const DEFAULT_MAX_RETRIES: i32 = 3;

const DEFAULT_LIST_LIMIT: i64 = 100;
const MAX_LIST_LIMIT: i64 = 500;

fn default_max_retries() -> i32 {
    DEFAULT_MAX_RETRIES
}

/// Submission payload for a new job.
#[derive(Debug, Clone, Deserialize)]
pub struct JobCreate {
    pub name: String,
    #[serde(default)]
    pub payload: Option<serde_json::Value>,
    pub schedule_type: ScheduleType,
    #[serde(default)]
    pub run_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub interval_seconds: Option<i32>,
    #[serde(default = "default_max_retries")]
    pub max_retries: i32,
}

impl JobCreate {
    fn validate(&self, now: DateTime<Utc>) -> Result<(), SchedulerError> {
        if self.name.is_empty() {
            return Err(validation("name must not be empty"));
        }
        if self.name.chars().count() > MAX_NAME_LEN {
            return Err(validation("name must be at most 500 characters"));
        }
        if let Some(run_at) = self.run_at {
            if run_at <= now {
                return Err(validation("run_at must be in the future"));
            }
        }
        if let Some(interval) = self.interval_seconds {
            if interval <= 0 {
                return Err(validation("interval_seconds must be greater than 0"));
            }
        }
        if self.max_retries < 0 || self.max_retries > MAX_RETRIES_LIMIT {
            return Err(validation("max_retries must be between 0 and 100"));
        }
        match self.schedule_type {
            ScheduleType::OneTime => {
                if self.run_at.is_none() {
                    return Err(validation("one_time jobs require run_at"));
                }
                if self.interval_seconds.is_some() {
                    return Err(validation("one_time jobs must not have interval_seconds"));
                }
            }
            ScheduleType::Interval => {
                if self.interval_seconds.is_none() {
                    return Err(validation("interval jobs require interval_seconds"));
                }
            }
        }

        Ok(())
    }
}

fn validation(message: &str) -> SchedulerError {
    SchedulerError::Validation(message.to_string())
}

/// Listing filters and pagination, straight off the query string.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct JobFilter {
    pub status: Option<JobStatus>,
    pub schedule_type: Option<ScheduleType>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Clone)]
pub struct JobService {
    pool: PgPool,
}

impl JobService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Validate and persist a new job. Jobs always start SCHEDULED with an
    /// untouched retry budget.
    pub async fn create(&self, input: JobCreate) -> Result<Job, SchedulerError> {
        input.validate(Utc::now())?;

        let now = Utc::now();
        let job = Job {
            id: Uuid::new_v4(),
            name: input.name,
            payload: input.payload,
            schedule_type: input.schedule_type,
            run_at: input.run_at,
            interval_seconds: input.interval_seconds,
            max_retries: input.max_retries,
            retry_count: 0,
            status: JobStatus::Scheduled,
            created_at: now,
            updated_at: now,
            version: 1,
        };

        Ok(job.insert(&self.pool).await?)
    }

    pub async fn get(&self, id: Uuid) -> Result<Job, SchedulerError> {
        Job::find_by_id(&self.pool, id)
            .await?
            .ok_or(SchedulerError::NotFound)
    }

    pub async fn list(&self, filter: JobFilter) -> Result<(Vec<Job>, i64), SchedulerError> {
        let limit = filter.limit.unwrap_or(DEFAULT_LIST_LIMIT);
        if !(1..=MAX_LIST_LIMIT).contains(&limit) {
            return Err(validation("limit must be between 1 and 500"));
        }
        let offset = filter.offset.unwrap_or(0);
        if offset < 0 {
            return Err(validation("offset must not be negative"));
        }

        Ok(Job::list(&self.pool, filter.status, filter.schedule_type, limit, offset).await?)
    }

    /// Operator status change, validated against the transition table.
    pub async fn update_status(
        &self,
        id: Uuid,
        new_status: JobStatus,
    ) -> Result<Job, SchedulerError> {
        let job = self.get(id).await?;
        if !job.status.operator_can_transition(new_status) {
            return Err(SchedulerError::InvalidTransition {
                from: job.status,
                to: new_status,
            });
        }

        match Job::update_status(&self.pool, id, job.status, new_status).await? {
            Some(updated) => Ok(updated),
            // The row moved under us between the read and the write (a worker
            // committed, or another operator won). Re-read and report the
            // transition that actually got rejected.
            None => {
                let current = self.get(id).await?;
                Err(SchedulerError::InvalidTransition {
                    from: current.status,
                    to: new_status,
                })
            }
        }
    }

    /// Delete a job and, through the FK cascade, its execution history.
    pub async fn delete(&self, id: Uuid) -> Result<(), SchedulerError> {
        if Job::delete(&self.pool, id).await? {
            Ok(())
        } else {
            Err(SchedulerError::NotFound)
        }
    }

    pub async fn executions(&self, job_id: Uuid) -> Result<Vec<JobExecution>, SchedulerError> {
        Ok(JobExecution::list_for_job(&self.pool, job_id).await?)
    }

    /// Execution history for a page of jobs, grouped by job id.
    pub async fn executions_for(
        &self,
        job_ids: &[Uuid],
    ) -> Result<HashMap<Uuid, Vec<JobExecution>>, SchedulerError> {
        if job_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let rows = JobExecution::list_for_jobs(&self.pool, job_ids).await?;
        let mut by_job: HashMap<Uuid, Vec<JobExecution>> = HashMap::new();
        for row in rows {
            by_job.entry(row.job_id).or_default().push(row);
        }

        Ok(by_job)
    }
}
