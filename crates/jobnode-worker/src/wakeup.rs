//! Wake-up driven worker loop.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use async_trait::async_trait;
use futures::FutureExt;
use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, error};

use crate::error::WakeupError;

/// The work a [`WakeupWorker`] performs on each wake-up.
#[async_trait]
pub trait Worker: Send + Sync + 'static {
    async fn work(&self);
}

/// Observable state of a [`WakeupWorker`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    /// Never started.
    Unstarted,
    /// Started and waiting for a wake-up.
    Idle,
    /// Executing work, nothing queued.
    Working,
    /// A run is queued behind the current one (or about to start).
    WorkPending,
    /// Stopped; may be started again.
    Stopped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lifecycle {
    Unstarted,
    Started,
    Stopped,
}

struct Inner {
    lifecycle: Lifecycle,
    working: bool,
    pending: bool,
    /// Bumped on every start and stop; a loop exits once it no longer matches.
    generation: u64,
    handle: Option<JoinHandle<()>>,
}

struct Shared {
    inner: Mutex<Inner>,
    notify: Notify,
}

enum Step {
    Exit,
    Wait,
    Work,
}

/// Runs a [`Worker`] on a dedicated tokio task, one execution at a time.
///
/// - `wake_up` while idle runs the work once.
/// - `wake_up` while working queues exactly one more run; further wake-ups
///   coalesce into it.
/// - `wake_up` before `start` is remembered and runs once after `start`.
/// - `stop` lets in-flight work finish and waits for the loop to exit.
///
/// Panics inside the work are caught and logged; the loop keeps serving
/// later wake-ups.
pub struct WakeupWorker {
    name: String,
    worker: Arc<dyn Worker>,
    shared: Arc<Shared>,
}

impl WakeupWorker {
    pub fn new(name: impl Into<String>, worker: Arc<dyn Worker>) -> Self {
        Self {
            name: name.into(),
            worker,
            shared: Arc::new(Shared {
                inner: Mutex::new(Inner {
                    lifecycle: Lifecycle::Unstarted,
                    working: false,
                    pending: false,
                    generation: 0,
                    handle: None,
                }),
                notify: Notify::new(),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Spawn the worker loop. Must be called from within a tokio runtime.
    ///
    /// A worker may be started again after `stop` has returned; wake-ups from
    /// before the stop are discarded.
    pub fn start(&self) -> Result<(), WakeupError> {
        let mut inner = self.shared.inner.lock();
        match inner.lifecycle {
            Lifecycle::Started => return Err(WakeupError::AlreadyStarted),
            Lifecycle::Stopped => inner.pending = false,
            Lifecycle::Unstarted => {}
        }
        inner.lifecycle = Lifecycle::Started;
        inner.working = false;
        inner.generation += 1;

        let handle = tokio::spawn(run_loop(
            self.name.clone(),
            self.shared.clone(),
            self.worker.clone(),
            inner.generation,
        ));
        inner.handle = Some(handle);

        debug!("Wakeup worker '{}' started", self.name);
        Ok(())
    }

    /// Request one execution of the work. Never blocks.
    pub fn wake_up(&self) -> Result<(), WakeupError> {
        {
            let mut inner = self.shared.inner.lock();
            if inner.lifecycle == Lifecycle::Stopped {
                return Err(WakeupError::AlreadyStopped);
            }
            inner.pending = true;
        }
        self.shared.notify.notify_waiters();
        Ok(())
    }

    /// Stop the loop once in-flight work completes, and wait for it to exit.
    pub async fn stop(&self) -> Result<(), WakeupError> {
        let handle = {
            let mut inner = self.shared.inner.lock();
            match inner.lifecycle {
                Lifecycle::Unstarted => return Err(WakeupError::NotStarted),
                Lifecycle::Stopped => return Err(WakeupError::AlreadyStopped),
                Lifecycle::Started => {}
            }
            inner.lifecycle = Lifecycle::Stopped;
            inner.generation += 1;
            inner.handle.take()
        };
        self.shared.notify.notify_waiters();

        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                error!("Wakeup worker '{}' loop terminated abnormally: {}", self.name, e);
            }
        }

        debug!("Wakeup worker '{}' stopped", self.name);
        Ok(())
    }

    pub fn state(&self) -> WorkerState {
        let inner = self.shared.inner.lock();
        match inner.lifecycle {
            Lifecycle::Unstarted => WorkerState::Unstarted,
            Lifecycle::Stopped => WorkerState::Stopped,
            Lifecycle::Started => match (inner.working, inner.pending) {
                (_, true) => WorkerState::WorkPending,
                (true, false) => WorkerState::Working,
                (false, false) => WorkerState::Idle,
            },
        }
    }
}

async fn run_loop(name: String, shared: Arc<Shared>, worker: Arc<dyn Worker>, generation: u64) {
    loop {
        // Register interest before reading the flags so a wake-up that lands
        // between the check and the await is not lost.
        let notified = shared.notify.notified();
        tokio::pin!(notified);
        notified.as_mut().enable();

        let step = {
            let mut inner = shared.inner.lock();
            if inner.generation != generation {
                Step::Exit
            } else if inner.pending {
                inner.pending = false;
                inner.working = true;
                Step::Work
            } else {
                Step::Wait
            }
        };

        match step {
            Step::Exit => break,
            Step::Wait => notified.await,
            Step::Work => {
                if let Err(panic) = AssertUnwindSafe(worker.work()).catch_unwind().await {
                    error!("Wakeup worker '{}' work panicked: {}", name, panic_message(&*panic));
                }
                shared.inner.lock().working = false;
            }
        }
    }
    debug!("Wakeup worker '{}' loop exited", name);
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
#[path = "wakeup_tests.rs"]
mod tests;
