//! Worker tick: crash recovery plus the claim-and-execute loop.
//!
//! ```text
//! tick
//!  ├─► Phase 1 (own transaction)
//!  │     reset RUNNING jobs untouched for stale_running_minutes
//!  └─► Phase 2 (one transaction per job)
//!        claim (FOR UPDATE SKIP LOCKED)
//!        insert pessimistic execution row, set RUNNING
//!        run the action
//!        finish the execution row, apply the retry/reschedule policy
//!        commit
//! ```
//!
//! The claimed row stays locked from claim to commit, so operator updates to
//! the same job block until the attempt's outcome is durable. Any error in a
//! tick rolls the transaction back and the loop keeps going.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::Utc;
use sqlx::PgPool;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::action::ActionRunner;
use super::execution::{ExecutionStatus, JobExecution};
use super::job::{Job, JobStatus, ScheduleType};

/// Configuration for the job worker.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// How long to sleep between poll-loop iterations
    pub poll_interval: Duration,
    /// RUNNING jobs untouched for this long are considered abandoned
    pub stale_running_minutes: i64,
    /// Worker ID for this instance (log correlation only)
    pub worker_id: String,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
            stale_running_minutes: 10,
            worker_id: format!("worker-{}", Uuid::new_v4()),
        }
    }
}

impl WorkerConfig {
    /// Create a new config with a specific worker ID.
    pub fn with_worker_id(worker_id: impl Into<String>) -> Self {
        Self {
            worker_id: worker_id.into(),
            ..Default::default()
        }
    }
}

/// Claims ready jobs and executes them. Safe to run many of these, in any
/// mix of resident loops and external triggers: the skip-locked claim is the
/// only coordination needed.
pub struct JobWorker {
    pool: PgPool,
    runner: Arc<dyn ActionRunner>,
    config: WorkerConfig,
    shutdown: Arc<AtomicBool>,
}

impl JobWorker {
    pub fn new(pool: PgPool, runner: Arc<dyn ActionRunner>) -> Self {
        Self::with_config(pool, runner, WorkerConfig::default())
    }

    pub fn with_config(pool: PgPool, runner: Arc<dyn ActionRunner>, config: WorkerConfig) -> Self {
        Self {
            pool,
            runner,
            config,
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Get a shutdown handle for graceful shutdown.
    pub fn shutdown_handle(&self) -> Arc<AtomicBool> {
        self.shutdown.clone()
    }

    /// Request shutdown of the poll loop.
    pub fn request_shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }

    fn is_shutdown_requested(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }

    /// Phase 1: pull RUNNING jobs whose worker died back into the eligible
    /// pool. Runs in its own transaction. Returns the number reset.
    pub async fn recover_stale(&self) -> Result<u64> {
        let threshold = Utc::now() - chrono::Duration::minutes(self.config.stale_running_minutes);
        let reset = Job::reset_stale_running(&self.pool, threshold).await?;
        if reset > 0 {
            info!(count = reset, "crash recovery reset stale RUNNING jobs to SCHEDULED");
        }

        Ok(reset)
    }

    /// Phase 2: claim one ready job, execute it, commit the outcome.
    /// Returns `false` when nothing was claimable.
    pub async fn process_one(&self) -> Result<bool> {
        let mut tx = self.pool.begin().await?;

        let Some(job) = Job::claim_one(&mut tx).await? else {
            tx.rollback().await?;
            return Ok(false);
        };

        let attempt = job.retry_count + 1;

        // Pessimistic attempt record: starts FAILED, success overwrites it.
        let execution = JobExecution::insert(&mut tx, job.id, attempt).await?;
        Job::mark_running(&mut tx, job.id).await?;

        debug!(
            job_id = %job.id,
            job_name = %job.name,
            attempt,
            worker_id = %self.config.worker_id,
            "executing job"
        );

        let outcome = self.runner.run(&job, attempt).await;
        let finished_at = Utc::now();

        // Terminal statuses are never overwritten. The attempt record is
        // still finished either way.
        let current = Job::current_status(&mut tx, job.id).await?;
        let writeback = !current.map_or(true, JobStatus::is_terminal);

        if outcome.success {
            JobExecution::finish(
                &mut tx,
                execution.id,
                ExecutionStatus::Success,
                None,
                Some(&outcome.message),
                finished_at,
            )
            .await?;

            if writeback {
                match (job.schedule_type, job.interval_seconds) {
                    (ScheduleType::Interval, Some(interval)) if interval > 0 => {
                        let next_run_at = finished_at + chrono::Duration::seconds(interval as i64);
                        Job::reschedule_interval(&mut tx, job.id, next_run_at).await?;
                        info!(job_id = %job.id, attempt, next_run_at = %next_run_at, "interval job rescheduled");
                    }
                    _ => {
                        Job::complete(&mut tx, job.id).await?;
                        info!(job_id = %job.id, attempt, "job completed");
                    }
                }
            }
        } else {
            JobExecution::finish(
                &mut tx,
                execution.id,
                ExecutionStatus::Failed,
                Some(&outcome.message),
                None,
                finished_at,
            )
            .await?;

            if writeback {
                if attempt > job.max_retries {
                    Job::mark_failed(&mut tx, job.id).await?;
                    warn!(job_id = %job.id, attempt, error = %outcome.message, "job failed permanently");
                } else {
                    Job::reschedule_retry(&mut tx, job.id, attempt).await?;
                    warn!(job_id = %job.id, attempt, error = %outcome.message, "job attempt failed, will retry");
                }
            }
        }

        tx.commit().await?;
        Ok(true)
    }

    /// One external-trigger tick: crash recovery once, then up to `max_jobs`
    /// claim-and-execute rounds. Returns `(stale_reset, processed)`.
    pub async fn run_pending(&self, max_jobs: u64) -> Result<(u64, u64)> {
        let stale_reset = self.recover_stale().await?;

        let mut processed = 0;
        while processed < max_jobs {
            if !self.process_one().await? {
                break;
            }
            processed += 1;
        }

        Ok((stale_reset, processed))
    }

    /// Resident poll loop: crash recovery, at most one job, then sleep.
    /// Transient store errors are logged and the loop continues.
    pub async fn run(self) -> Result<()> {
        info!(
            worker_id = %self.config.worker_id,
            poll_interval_secs = self.config.poll_interval.as_secs(),
            stale_running_minutes = self.config.stale_running_minutes,
            "worker starting"
        );

        loop {
            if self.is_shutdown_requested() {
                break;
            }

            if let Err(e) = self.recover_stale().await {
                error!(error = %e, "crash recovery failed");
            }

            if let Err(e) = self.process_one().await {
                error!(error = %e, "failed to process job");
            }

            tokio::time::sleep(self.config.poll_interval).await;
        }

        info!(worker_id = %self.config.worker_id, "worker stopped");
        Ok(())
    }

    /// Run until a shutdown signal is received.
    ///
    /// Convenience method that listens for Ctrl+C.
    pub async fn run_until_shutdown(self) -> Result<()> {
        let shutdown = self.shutdown_handle();

        tokio::spawn(async move {
            let _ = tokio::signal::ctrl_c().await;
            info!("received shutdown signal");
            shutdown.store(true, Ordering::SeqCst);
        });

        self.run().await
    }
}
