//! Core error types.

use thiserror::Error;

/// Errors raised by a [`JobStore`](crate::store::JobStore) backend.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Filesystem failure.
    #[error("Storage IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Record could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Generic backend error.
    #[error("{0}")]
    Backend(String),
}

/// Errors raised while registering adapters.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    /// An adapter with this type tag is already registered.
    #[error("Adapter type already registered: {0}")]
    AlreadyRegistered(String),
}

/// Construction-time problems with a job definition.
///
/// Every message is meant to be shown to the user as-is.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{}", .errors.join("; "))]
pub struct ValidationErrors {
    pub errors: Vec<String>,
}

impl ValidationErrors {
    pub fn new(errors: Vec<String>) -> Self {
        Self { errors }
    }

    pub fn single(message: impl Into<String>) -> Self {
        Self {
            errors: vec![message.into()],
        }
    }

    pub fn messages(&self) -> &[String] {
        &self.errors
    }
}
