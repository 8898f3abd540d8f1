//! # jobnode Worker
//!
//! [`WakeupWorker`] runs a [`Worker`]'s work on its own tokio task whenever
//! it is woken up. At most one execution runs at a time, and wake-ups that
//! arrive while work is running coalesce into exactly one re-run.

mod error;
mod wakeup;

pub use error::WakeupError;
pub use wakeup::{WakeupWorker, Worker, WorkerState};
