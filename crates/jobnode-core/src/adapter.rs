//! Adapter capability and registry.
//!
//! An adapter is one pipeline step: it receives the previous step's output
//! (or the trigger input) together with the task's static parameters and
//! either produces a new value or fails. Adapters are registered once at
//! startup, keyed by their type tag.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::error::RegistryError;

/// Failure of a single adapter invocation or parameter check.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct AdapterError(pub String);

impl AdapterError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }

    /// Error for a required parameter that is absent or has the wrong shape.
    pub fn missing_param(name: &str) -> Self {
        Self(format!("missing required param '{}'", name))
    }
}

/// Input handed to [`Adapter::perform`].
#[derive(Debug, Clone, Default)]
pub struct AdapterInput {
    /// Previous task's result, or the trigger input for the first task.
    pub data: Value,

    /// The task's static parameters.
    pub params: Map<String, Value>,
}

impl AdapterInput {
    pub fn new(data: Value, params: Map<String, Value>) -> Self {
        Self { data, params }
    }

    pub fn param(&self, name: &str) -> Option<&Value> {
        self.params.get(name)
    }

    /// A required string parameter.
    pub fn str_param(&self, name: &str) -> Result<&str, AdapterError> {
        self.params
            .get(name)
            .and_then(Value::as_str)
            .ok_or_else(|| AdapterError::missing_param(name))
    }

    /// `data` as text: strings verbatim, `null` as empty, anything else as JSON.
    pub fn data_as_text(&self) -> String {
        match &self.data {
            Value::String(s) => s.clone(),
            Value::Null => String::new(),
            other => other.to_string(),
        }
    }
}

/// A pluggable pipeline step.
#[async_trait]
pub trait Adapter: Send + Sync {
    /// Type tag used in task specifications (e.g. `"HttpGet"`).
    fn adapter_type(&self) -> &str;

    /// Check a task's static parameters when a job is created.
    fn validate(&self, _params: &Map<String, Value>) -> Result<(), AdapterError> {
        Ok(())
    }

    /// Transform the input into an output value or fail.
    async fn perform(&self, input: &AdapterInput) -> Result<Value, AdapterError>;
}

/// Registry of adapters keyed by type tag.
pub struct AdapterRegistry {
    adapters: DashMap<String, Arc<dyn Adapter>>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self {
            adapters: DashMap::new(),
        }
    }

    /// Register an adapter.
    ///
    /// Returns an error if an adapter with the same type tag is already registered.
    pub fn register(&self, adapter: Arc<dyn Adapter>) -> Result<(), RegistryError> {
        let adapter_type = adapter.adapter_type().to_string();
        if self.adapters.contains_key(&adapter_type) {
            return Err(RegistryError::AlreadyRegistered(adapter_type));
        }
        self.adapters.insert(adapter_type, adapter);
        Ok(())
    }

    pub fn get(&self, adapter_type: &str) -> Option<Arc<dyn Adapter>> {
        self.adapters.get(adapter_type).map(|entry| entry.value().clone())
    }

    pub fn contains(&self, adapter_type: &str) -> bool {
        self.adapters.contains_key(adapter_type)
    }

    /// Registered type tags, sorted.
    pub fn types(&self) -> Vec<String> {
        let mut types: Vec<String> = self.adapters.iter().map(|e| e.key().clone()).collect();
        types.sort();
        types
    }

    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }
}

impl Default for AdapterRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "adapter_tests.rs"]
mod tests;
