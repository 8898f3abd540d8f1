//! # jobnode Scheduler
//!
//! Fires jobs at their cron recurrences and one-off `runAt` instants.
//!
//! A single timer task sleeps until the earliest due instant and wakes a
//! shared [`WakeupWorker`](jobnode_worker::WakeupWorker). The worker pops
//! every due entry and hands each one to the
//! [`TaskPipelineExecutor`](jobnode_pipeline::TaskPipelineExecutor) on its
//! own tokio task.

mod clock;
mod error;
mod registry;
mod scheduler;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::SchedulerError;
pub use registry::{Fire, JobRegistry};
pub use scheduler::{Scheduler, SchedulerConfig};
