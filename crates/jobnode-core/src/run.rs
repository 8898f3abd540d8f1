//! Execution records.
//!
//! A [`JobRun`] is one execution of a job. It owns its [`TaskRun`]s, which
//! are appended one at a time as the pipeline advances. Once a run reaches
//! a terminal status its history is frozen.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ids::{JobId, RunId};
use crate::job::TaskSpec;

/// Status shared by job runs and task runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum RunStatus {
    /// Created, not yet started.
    #[default]
    Pending,
    /// Currently executing.
    InProgress,
    /// Finished successfully.
    Completed,
    /// Finished with an error.
    Errored,
}

impl RunStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, RunStatus::Completed | RunStatus::Errored)
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RunStatus::Pending => "pending",
            RunStatus::InProgress => "inProgress",
            RunStatus::Completed => "completed",
            RunStatus::Errored => "errored",
        };
        f.write_str(s)
    }
}

/// What created a job run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Trigger {
    /// A cron recurrence due at `at`.
    Cron { at: DateTime<Utc> },
    /// A one-off instant from the schedule's `runAt` list.
    RunAt { at: DateTime<Utc> },
    /// An explicit request, e.g. through the HTTP API.
    External,
}

impl Trigger {
    /// The one-off instant this run consumed, if any.
    pub fn run_at(&self) -> Option<DateTime<Utc>> {
        match self {
            Trigger::RunAt { at } => Some(*at),
            _ => None,
        }
    }
}

/// Execution record of one task within a job run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRun {
    pub index: usize,
    pub task: TaskSpec,
    pub status: RunStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TaskRun {
    /// A task run that has just started executing.
    pub fn started(index: usize, task: TaskSpec) -> Self {
        Self {
            index,
            task,
            status: RunStatus::InProgress,
            result: None,
            error: None,
        }
    }

    pub fn complete(&mut self, result: Value) {
        self.status = RunStatus::Completed;
        self.result = Some(result);
    }

    pub fn fail(&mut self, error: impl Into<String>) {
        self.status = RunStatus::Errored;
        self.error = Some(error.into());
    }
}

/// One execution of a job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRun {
    pub id: RunId,
    pub job_id: JobId,
    pub trigger: Trigger,
    pub status: RunStatus,
    #[serde(default)]
    pub task_runs: Vec<TaskRun>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl JobRun {
    /// A pending run with no task runs.
    pub fn new(job_id: JobId, trigger: Trigger) -> Self {
        Self {
            id: RunId::generate(),
            job_id,
            trigger,
            status: RunStatus::Pending,
            task_runs: Vec::new(),
            result: None,
            error: None,
            created_at: Utc::now(),
            completed_at: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn start(&mut self) {
        if self.status == RunStatus::Pending {
            self.status = RunStatus::InProgress;
        }
    }

    /// Append a new in-progress task run and return it.
    ///
    /// Returns `None` once the run is terminal.
    pub fn start_task(&mut self, task: TaskSpec) -> Option<&mut TaskRun> {
        if self.is_terminal() {
            return None;
        }
        let index = self.task_runs.len();
        self.task_runs.push(TaskRun::started(index, task));
        self.task_runs.last_mut()
    }

    /// The most recently appended task run, while the run is not terminal.
    pub fn current_task_mut(&mut self) -> Option<&mut TaskRun> {
        if self.is_terminal() {
            return None;
        }
        self.task_runs.last_mut()
    }

    /// Mark the run completed. Ignored once terminal.
    pub fn complete(&mut self, result: Value) {
        if self.is_terminal() {
            return;
        }
        self.status = RunStatus::Completed;
        self.result = Some(result);
        self.completed_at = Some(Utc::now());
    }

    /// Mark the run errored. Ignored once terminal.
    pub fn fail(&mut self, error: impl Into<String>) {
        if self.is_terminal() {
            return;
        }
        self.status = RunStatus::Errored;
        self.error = Some(error.into());
        self.completed_at = Some(Utc::now());
    }
}

#[cfg(test)]
#[path = "run_tests.rs"]
mod tests;
