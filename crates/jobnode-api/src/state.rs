//! Application state.

use std::sync::Arc;
use std::time::Instant;

use jobnode_core::{AdapterRegistry, JobStore};
use jobnode_pipeline::TaskPipelineExecutor;
use jobnode_scheduler::Scheduler;
use tokio_util::task::TaskTracker;

/// State shared across handlers.
pub struct AppState {
    pub executor: TaskPipelineExecutor,
    /// Jobs created over the API are registered here when present.
    pub scheduler: Option<Arc<Scheduler>>,
    runs: TaskTracker,
    start_time: Instant,
}

impl AppState {
    pub fn new(executor: TaskPipelineExecutor, scheduler: Option<Arc<Scheduler>>) -> Self {
        Self {
            executor,
            scheduler,
            runs: TaskTracker::new(),
            start_time: Instant::now(),
        }
    }

    pub fn store(&self) -> &Arc<dyn JobStore> {
        self.executor.store()
    }

    pub fn adapters(&self) -> &Arc<AdapterRegistry> {
        self.executor.adapters()
    }

    /// Tracker for runs started by external triggers.
    pub fn runs(&self) -> &TaskTracker {
        &self.runs
    }

    /// Wait for every externally triggered run to finish.
    pub async fn drain(&self) {
        self.runs.close();
        self.runs.wait().await;
        self.runs.reopen();
    }

    pub fn uptime(&self) -> std::time::Duration {
        self.start_time.elapsed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jobnode_core::MemoryJobStore;

    fn state() -> AppState {
        let executor = TaskPipelineExecutor::new(
            Arc::new(MemoryJobStore::new()),
            Arc::new(AdapterRegistry::new()),
        );
        AppState::new(executor, None)
    }

    #[tokio::test]
    async fn test_drain_waits_for_runs() {
        let state = state();
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        state.runs().spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            let _ = tx.send(());
        });

        state.drain().await;
        assert!(rx.await.is_ok());
        assert!(!state.runs().is_closed());
    }

    #[test]
    fn test_uptime() {
        let state = state();
        std::thread::sleep(std::time::Duration::from_millis(5));
        assert!(state.uptime().as_millis() >= 5);
    }
}
