//! Worker error types.

use thiserror::Error;

/// Misuse of a [`WakeupWorker`](crate::WakeupWorker) lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum WakeupError {
    /// `start` was called on a running worker.
    #[error("wakeup worker is already started")]
    AlreadyStarted,

    /// `stop` was called on a worker that was never started.
    #[error("wakeup worker has not been started")]
    NotStarted,

    /// The worker was stopped.
    #[error("wakeup worker is already stopped")]
    AlreadyStopped,
}
