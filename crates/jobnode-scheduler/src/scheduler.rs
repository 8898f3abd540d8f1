//! Scheduler service: timer loop plus dispatch worker.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use jobnode_core::{Job, JobId, JobRun, JobStore};
use jobnode_pipeline::{PipelineError, TaskPipelineExecutor};
use jobnode_worker::{WakeupWorker, Worker};
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

use crate::clock::{Clock, SystemClock};
use crate::error::SchedulerError;
use crate::registry::JobRegistry;

/// Scheduler behaviour switches.
#[derive(Debug, Clone, Default)]
pub struct SchedulerConfig {
    /// Fire one-off instants that were already in the past when the job was
    /// registered, instead of skipping them.
    pub catch_up_missed_run_at: bool,
}

struct Core {
    registry: Mutex<JobRegistry>,
    executor: TaskPipelineExecutor,
    clock: Arc<dyn Clock>,
    config: SchedulerConfig,
    runs: TaskTracker,
    /// Signalled whenever the earliest due instant may have changed.
    rearm: Notify,
}

impl Core {
    fn run_due(&self, now: DateTime<Utc>) -> Vec<JoinHandle<Result<JobRun, PipelineError>>> {
        let fires = self.registry.lock().pop_due(now);
        if !fires.is_empty() {
            debug!("Dispatching {} due job(s)", fires.len());
        }

        fires
            .into_iter()
            .map(|fire| {
                let executor = self.executor.clone();
                self.runs.spawn(async move {
                    let result = executor.execute(&fire.job, fire.trigger, Value::Null).await;
                    match &result {
                        Ok(run) => debug!("Scheduled run {} of job {} finished: {}", run.id, fire.job.id, run.status),
                        Err(e) => error!("Scheduled run of job {} failed: {}", fire.job.id, e),
                    }
                    result
                })
            })
            .collect()
    }
}

/// Dispatch work performed by the shared wake-up worker.
struct DispatchDue {
    core: Arc<Core>,
}

#[async_trait]
impl Worker for DispatchDue {
    async fn work(&self) {
        let now = self.core.clock.now();
        self.core.run_due(now);
        self.core.rearm.notify_waiters();
    }
}

struct Timer {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// Fires registered jobs at their due instants.
pub struct Scheduler {
    core: Arc<Core>,
    worker: Arc<WakeupWorker>,
    timer: Mutex<Option<Timer>>,
}

impl Scheduler {
    pub fn new(executor: TaskPipelineExecutor, config: SchedulerConfig) -> Self {
        Self::with_clock(executor, config, Arc::new(SystemClock))
    }

    pub fn with_clock(
        executor: TaskPipelineExecutor,
        config: SchedulerConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let core = Arc::new(Core {
            registry: Mutex::new(JobRegistry::new()),
            executor,
            clock,
            config,
            runs: TaskTracker::new(),
            rearm: Notify::new(),
        });
        let worker = Arc::new(WakeupWorker::new(
            "scheduler",
            Arc::new(DispatchDue { core: core.clone() }),
        ));
        Self {
            core,
            worker,
            timer: Mutex::new(None),
        }
    }

    fn store(&self) -> &Arc<dyn JobStore> {
        self.core.executor.store()
    }

    pub fn is_running(&self) -> bool {
        self.timer.lock().is_some()
    }

    /// Register every persisted job, then start the worker and timer.
    ///
    /// Jobs whose schedule can no longer be parsed are logged and skipped.
    pub async fn start(&self) -> Result<(), SchedulerError> {
        if self.is_running() {
            return Err(SchedulerError::AlreadyRunning);
        }

        let jobs = self.store().jobs().await?;
        let mut loaded = 0;
        for job in jobs {
            let id = job.id.clone();
            match self.add_job(job).await {
                Ok(()) => loaded += 1,
                Err(e) => warn!("Skipping job {}: {}", id, e),
            }
        }

        self.worker.start()?;

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(timer_loop(
            self.core.clone(),
            self.worker.clone(),
            cancel.clone(),
        ));
        *self.timer.lock() = Some(Timer { cancel, handle });

        info!("Scheduler started ({} persisted jobs checked, {} scheduled)", loaded, self.job_count());
        Ok(())
    }

    /// Stop the timer and worker, then wait for in-flight runs to finish.
    pub async fn stop(&self) -> Result<(), SchedulerError> {
        let timer = self.timer.lock().take().ok_or(SchedulerError::NotRunning)?;
        timer.cancel.cancel();
        if let Err(e) = timer.handle.await {
            error!("Scheduler timer terminated abnormally: {}", e);
        }

        self.worker.stop().await?;

        self.core.runs.close();
        self.core.runs.wait().await;
        self.core.runs.reopen();

        info!("Scheduler stopped");
        Ok(())
    }

    /// Register a job with a time-based schedule.
    ///
    /// Jobs without cron or one-off instants are ignored. One-off instants
    /// already recorded as fired in the store are not fired again.
    pub async fn add_job(&self, job: Job) -> Result<(), SchedulerError> {
        if !job.schedule.is_time_triggered() {
            debug!("Job {} has no time trigger, not scheduling", job.id);
            return Ok(());
        }

        let fired: HashSet<DateTime<Utc>> = if job.schedule.run_at.is_empty() {
            HashSet::new()
        } else {
            self.store()
                .job_runs_for(&job.id)
                .await?
                .iter()
                .filter_map(|run| run.trigger.run_at())
                .collect()
        };

        let now = self.core.clock.now();
        let job_id = job.id.clone();
        let next = self
            .core
            .registry
            .lock()
            .insert(
                Arc::new(job),
                &fired,
                now,
                self.core.config.catch_up_missed_run_at,
            )
            .map_err(|source| SchedulerError::Cron {
                job_id: job_id.clone(),
                source,
            })?;

        match next {
            Some(at) => debug!("Job {} scheduled, next due {}", job_id, at.to_rfc3339()),
            None => debug!("Job {} registered but dormant", job_id),
        }
        self.core.rearm.notify_waiters();
        Ok(())
    }

    pub fn next_due(&self, id: &JobId) -> Option<DateTime<Utc>> {
        self.core.registry.lock().next_due(id)
    }

    /// Whether a registered job has nothing left to fire. `false` for
    /// unknown jobs.
    pub fn is_dormant(&self, id: &JobId) -> bool {
        self.core.registry.lock().is_dormant(id)
    }

    /// Number of registered jobs, dormant ones included.
    pub fn job_count(&self) -> usize {
        self.core.registry.lock().len()
    }

    /// Dispatch every job due at or before `now` and return the spawned runs.
    pub fn run_due(&self, now: DateTime<Utc>) -> Vec<JoinHandle<Result<JobRun, PipelineError>>> {
        self.core.run_due(now)
    }
}

async fn timer_loop(core: Arc<Core>, worker: Arc<WakeupWorker>, cancel: CancellationToken) {
    debug!("Scheduler timer started");
    loop {
        let rearmed = core.rearm.notified();
        tokio::pin!(rearmed);
        rearmed.as_mut().enable();

        let earliest = core.registry.lock().earliest();
        let now = core.clock.now();

        match earliest {
            Some(at) if at <= now => {
                if let Err(e) = worker.wake_up() {
                    warn!("Scheduler worker rejected wake-up: {}", e);
                    break;
                }
                // Wait for the worker to dispatch before re-reading the queue
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = &mut rearmed => {}
                }
            }
            Some(at) => {
                let delay = (at - now).to_std().unwrap_or_default();
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(delay) => {}
                    _ = &mut rearmed => {}
                }
            }
            None => {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = &mut rearmed => {}
                }
            }
        }
    }
    debug!("Scheduler timer stopped");
}

#[cfg(test)]
#[path = "scheduler_tests.rs"]
mod tests;
