//! Pipeline error types.

use jobnode_core::{RegistryError, RunId, StoreError};
use thiserror::Error;

/// Errors that stop the executor itself, as opposed to task failures,
/// which are recorded on the run.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The job store rejected a write.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// The HTTP client used by the adapters could not be built.
    #[error("HTTP client error: {0}")]
    Client(#[from] reqwest::Error),

    /// `run` was handed a run that already executed tasks.
    #[error("Run {0} has already started executing tasks")]
    RunAlreadyStarted(RunId),

    /// Adapter registration failed.
    #[error(transparent)]
    Registry(#[from] RegistryError),
}
