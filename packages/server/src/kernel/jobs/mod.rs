//! Durable job scheduling and execution.
//!
//! ```text
//! JobService (REST core)          JobWorker (tick)
//!     │                               │
//!     ▼                               ├─► Phase 1: reset stale RUNNING jobs
//! jobs table ◄──────────────────────  ├─► Phase 2: claim (FOR UPDATE SKIP LOCKED)
//! job_executions table ◄──────────    │       insert attempt, run action,
//!                                     │       commit outcome in one transaction
//!                                     └─► ActionRunner (webhook / quote fetch)
//! ```
//!
//! Concurrency is carried entirely by the database: a claimed row stays
//! locked until the claiming transaction commits, and other workers skip
//! locked rows instead of blocking on them.

mod action;
mod error;
mod execution;
mod job;
mod service;
mod worker;

pub use action::{
    resolve_action, ActionKind, ActionOutcome, ActionRunner, ExecutionSettings, HttpActionRunner,
};
pub use error::SchedulerError;
pub use execution::{ExecutionStatus, JobExecution};
pub use job::{Job, JobStatus, ScheduleType};
pub use service::{JobCreate, JobFilter, JobService};
pub use worker::{JobWorker, WorkerConfig};
