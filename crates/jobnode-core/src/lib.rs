//! # jobnode Core
//!
//! Shared building blocks for the jobnode scheduler and pipeline engine.
//!
//! ## Components
//!
//! - [`Job`], [`TaskSpec`], [`Schedule`] - immutable job definitions
//! - [`JobRun`], [`TaskRun`], [`RunStatus`], [`Trigger`] - execution records
//! - [`CronSpec`] - five/six-field cron expressions
//! - [`Adapter`], [`AdapterRegistry`] - the pipeline step capability
//! - [`JobStore`] - persistence boundary with memory and file backends

pub mod adapter;
pub mod cron;
pub mod error;
pub mod ids;
pub mod job;
pub mod run;
pub mod store;

pub use adapter::{Adapter, AdapterError, AdapterInput, AdapterRegistry};
pub use cron::{CronError, CronSpec};
pub use error::{RegistryError, StoreError, ValidationErrors};
pub use ids::{JobId, RunId};
pub use job::{Job, JobSpec, Schedule, TaskSpec};
pub use run::{JobRun, RunStatus, TaskRun, Trigger};
pub use store::{FileJobStore, JobStore, MemoryJobStore};
