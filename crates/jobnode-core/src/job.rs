//! Job definitions.
//!
//! A [`Job`] is an ordered pipeline of [`TaskSpec`]s plus a [`Schedule`].
//! Jobs are immutable once built; changing a job means creating a new one.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::adapter::AdapterRegistry;
use crate::cron::CronSpec;
use crate::error::ValidationErrors;
use crate::ids::JobId;

/// One pipeline step: an adapter type tag and its static parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskSpec {
    /// Adapter type tag.
    #[serde(rename = "type")]
    pub adapter_type: String,

    /// Adapter-specific parameters, opaque to the scheduler.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub params: Map<String, Value>,
}

impl TaskSpec {
    pub fn new(adapter_type: impl Into<String>) -> Self {
        Self {
            adapter_type: adapter_type.into(),
            params: Map::new(),
        }
    }

    /// Add a parameter.
    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }
}

/// When a job is triggered by time.
///
/// With neither `cron` nor `run_at` set, a job is only ever triggered
/// externally.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Schedule {
    /// Recurring cron expression.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cron: Option<String>,

    /// One-off instants, each fired at most once.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub run_at: Vec<DateTime<Utc>>,

    /// Nothing fires before this instant.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_at: Option<DateTime<Utc>>,

    /// Nothing fires after this instant.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_at: Option<DateTime<Utc>>,
}

impl Schedule {
    pub fn cron(expr: impl Into<String>) -> Self {
        Self {
            cron: Some(expr.into()),
            ..Self::default()
        }
    }

    pub fn run_at(instants: impl IntoIterator<Item = DateTime<Utc>>) -> Self {
        Self {
            run_at: instants.into_iter().collect(),
            ..Self::default()
        }
    }

    pub fn with_start_at(mut self, start_at: DateTime<Utc>) -> Self {
        self.start_at = Some(start_at);
        self
    }

    pub fn with_end_at(mut self, end_at: DateTime<Utc>) -> Self {
        self.end_at = Some(end_at);
        self
    }

    /// The cron expression, ignoring blank values.
    pub fn cron_expr(&self) -> Option<&str> {
        self.cron.as_deref().map(str::trim).filter(|s| !s.is_empty())
    }

    /// Whether the scheduler should ever trigger this job.
    pub fn is_time_triggered(&self) -> bool {
        self.cron_expr().is_some() || !self.run_at.is_empty()
    }

    /// Whether `at` lies inside `[start_at, end_at]`; unset bounds are open.
    pub fn within_bounds(&self, at: DateTime<Utc>) -> bool {
        self.start_at.is_none_or(|start| at >= start) && self.end_at.is_none_or(|end| at <= end)
    }
}

/// Request body for creating a job.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobSpec {
    #[serde(default)]
    pub tasks: Vec<TaskSpec>,

    #[serde(default)]
    pub schedule: Schedule,
}

/// A validated, immutable job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub tasks: Vec<TaskSpec>,
    #[serde(default)]
    pub schedule: Schedule,
    pub created_at: DateTime<Utc>,
}

impl Job {
    /// Create a job without validating it against any registry.
    pub fn new(tasks: Vec<TaskSpec>, schedule: Schedule) -> Self {
        Self {
            id: JobId::generate(),
            tasks,
            schedule,
            created_at: Utc::now(),
        }
    }

    /// Validate a job specification and build a job with a fresh id.
    ///
    /// Every problem found is reported, in task order followed by schedule
    /// problems. One-off instants are sorted and deduplicated.
    ///
    /// # Errors
    ///
    /// Unknown adapter types, adapter parameter errors, unparsable cron
    /// expressions and inverted bounds.
    pub fn build(spec: JobSpec, adapters: &AdapterRegistry) -> Result<Self, ValidationErrors> {
        let mut errors = Vec::new();

        for task in &spec.tasks {
            match adapters.get(&task.adapter_type) {
                None => errors.push(format!(
                    "{} is not a supported adapter type",
                    task.adapter_type
                )),
                Some(adapter) => {
                    if let Err(e) = adapter.validate(&task.params) {
                        errors.push(format!("{}: {}", task.adapter_type, e));
                    }
                }
            }
        }

        let mut schedule = spec.schedule;
        if let Some(expr) = schedule.cron_expr() {
            if let Err(e) = CronSpec::parse(expr) {
                errors.push(e.to_string());
            }
        } else {
            schedule.cron = None;
        }

        if let (Some(start), Some(end)) = (schedule.start_at, schedule.end_at) {
            if start > end {
                errors.push("Schedule: startAt must not be after endAt".to_string());
            }
        }

        if !errors.is_empty() {
            return Err(ValidationErrors::new(errors));
        }

        schedule.run_at.sort();
        schedule.run_at.dedup();

        Ok(Self::new(spec.tasks, schedule))
    }

    /// Parsed cron expression, if the schedule has one.
    pub fn cron_spec(&self) -> Option<Result<CronSpec, crate::cron::CronError>> {
        self.schedule.cron_expr().map(CronSpec::parse)
    }
}

#[cfg(test)]
#[path = "job_tests.rs"]
mod tests;
