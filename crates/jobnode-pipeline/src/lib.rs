//! # jobnode Pipeline
//!
//! Runs a job's tasks in order against the registered adapters, recording a
//! [`JobRun`](jobnode_core::JobRun) with one
//! [`TaskRun`](jobnode_core::TaskRun) per executed task.
//!
//! The [`adapters`] module provides the built-in adapter set.

pub mod adapters;
pub mod error;
pub mod executor;

pub use adapters::{AdapterSettings, default_registry};
pub use error::PipelineError;
pub use executor::TaskPipelineExecutor;
