//! Error taxonomy for the scheduling core.

use thiserror::Error;

use super::job::JobStatus;

#[derive(Debug, Error)]
pub enum SchedulerError {
    /// Malformed submission or query parameters.
    #[error("{0}")]
    Validation(String),

    #[error("Job not found")]
    NotFound,

    /// Operator requested a status change the transition table forbids.
    #[error("cannot transition job from {from} to {to}")]
    InvalidTransition { from: JobStatus, to: JobStatus },

    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

impl SchedulerError {
    /// Transient store failures worth surfacing as 503 rather than 500.
    pub fn is_store_unavailable(&self) -> bool {
        match self {
            SchedulerError::Database(e) => matches!(
                e,
                sqlx::Error::PoolTimedOut
                    | sqlx::Error::PoolClosed
                    | sqlx::Error::Io(_)
                    | sqlx::Error::Tls(_)
            ),
            _ => false,
        }
    }
}
