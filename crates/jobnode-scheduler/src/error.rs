//! Scheduler error types.

use jobnode_core::{CronError, JobId, StoreError};
use jobnode_worker::WakeupError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SchedulerError {
    /// The scheduler is already running.
    #[error("Scheduler is already running")]
    AlreadyRunning,

    /// The scheduler is not running.
    #[error("Scheduler is not running")]
    NotRunning,

    /// A job's cron expression is invalid.
    #[error("Job {job_id}: {source}")]
    Cron {
        job_id: JobId,
        #[source]
        source: CronError,
    },

    /// Loading jobs or past runs failed.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// The dispatch worker rejected a lifecycle call.
    #[error("Worker error: {0}")]
    Worker(#[from] WakeupError),
}
