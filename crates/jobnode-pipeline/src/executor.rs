//! Sequential task pipeline execution.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use jobnode_core::{AdapterInput, AdapterRegistry, Job, JobRun, JobStore, TaskSpec, Trigger};
use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::error::PipelineError;

/// Executes a job's tasks in order and records the outcome.
///
/// The run is persisted after every state change, so the store always holds
/// a prefix of the pipeline: task runs `0..k` with the last one possibly
/// still in progress. The first failing task ends the run; the remaining
/// tasks are never executed and never appear in the run. A store write that
/// fails also ends the run as errored. There are no retries at this level.
#[derive(Clone)]
pub struct TaskPipelineExecutor {
    store: Arc<dyn JobStore>,
    adapters: Arc<AdapterRegistry>,
}

impl TaskPipelineExecutor {
    pub fn new(store: Arc<dyn JobStore>, adapters: Arc<AdapterRegistry>) -> Self {
        Self { store, adapters }
    }

    pub fn store(&self) -> &Arc<dyn JobStore> {
        &self.store
    }

    pub fn adapters(&self) -> &Arc<AdapterRegistry> {
        &self.adapters
    }

    /// Create a run and drive it to completion.
    ///
    /// `input` is handed to the first task; a job without tasks completes
    /// with `input` as its result.
    pub async fn execute(
        &self,
        job: &Job,
        trigger: Trigger,
        input: Value,
    ) -> Result<JobRun, PipelineError> {
        let run = self.begin(job, trigger).await?;
        self.run(job, run, input).await
    }

    /// Create an in-progress run with no task runs and persist it.
    pub async fn begin(&self, job: &Job, trigger: Trigger) -> Result<JobRun, PipelineError> {
        let mut run = JobRun::new(job.id.clone(), trigger);
        run.start();
        self.store.save_job_run(&run).await?;
        info!("Started run {} for job {} ({} tasks)", run.id, job.id, job.tasks.len());
        Ok(run)
    }

    /// Drive a run created by [`begin`](Self::begin). Terminal runs are
    /// returned unchanged.
    ///
    /// # Errors
    ///
    /// [`PipelineError::RunAlreadyStarted`] when the run already holds task
    /// runs. A failed store write marks the run and its current task errored
    /// with the store error, makes one more attempt to persist that state,
    /// and returns [`PipelineError::Store`].
    pub async fn run(
        &self,
        job: &Job,
        mut run: JobRun,
        input: Value,
    ) -> Result<JobRun, PipelineError> {
        if run.is_terminal() {
            return Ok(run);
        }
        if !run.task_runs.is_empty() {
            return Err(PipelineError::RunAlreadyStarted(run.id));
        }

        let mut data = input;
        for task in &job.tasks {
            let adapter_input = AdapterInput::new(std::mem::take(&mut data), task.params.clone());
            let index = run.task_runs.len();
            run.start_task(task.clone());
            self.save(&mut run).await?;
            debug!("Run {} task {} ({}) started", run.id, index, task.adapter_type);

            match self.perform(task, &adapter_input).await {
                Ok(output) => {
                    if let Some(task_run) = run.current_task_mut() {
                        task_run.complete(output.clone());
                    }
                    self.save(&mut run).await?;
                    data = output;
                }
                Err(error) => {
                    warn!(
                        "Run {} task {} ({}) errored: {}",
                        run.id, index, task.adapter_type, error
                    );
                    if let Some(task_run) = run.current_task_mut() {
                        task_run.fail(error.clone());
                    }
                    run.fail(error);
                    self.save(&mut run).await?;
                    return Ok(run);
                }
            }
        }

        run.complete(data);
        self.save(&mut run).await?;
        info!("Run {} for job {} completed", run.id, job.id);
        Ok(run)
    }

    /// Persist `run`. On failure the run is ended as errored and written once
    /// more so the store never keeps it in progress.
    async fn save(&self, run: &mut JobRun) -> Result<(), PipelineError> {
        let Err(e) = self.store.save_job_run(run).await else {
            return Ok(());
        };

        let message = format!("Store error: {}", e);
        error!("Run {}: {}", run.id, message);
        if let Some(task_run) = run.current_task_mut() {
            if !task_run.status.is_terminal() {
                task_run.fail(message.clone());
            }
        }
        run.fail(message);

        if let Err(retry) = self.store.save_job_run(run).await {
            error!("Run {} could not be recorded as errored: {}", run.id, retry);
        }
        Err(e.into())
    }

    async fn perform(&self, task: &TaskSpec, input: &AdapterInput) -> Result<Value, String> {
        let adapter = self
            .adapters
            .get(&task.adapter_type)
            .ok_or_else(|| format!("{} is not a supported adapter type", task.adapter_type))?;

        match AssertUnwindSafe(adapter.perform(input)).catch_unwind().await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(e.to_string()),
            Err(panic) => {
                let message = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                Err(format!("{} adapter panicked: {}", task.adapter_type, message))
            }
        }
    }
}

#[cfg(test)]
#[path = "executor_tests.rs"]
mod tests;
