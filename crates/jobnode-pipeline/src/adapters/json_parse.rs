//! JSON path extraction.

use async_trait::async_trait;
use jobnode_core::{Adapter, AdapterError, AdapterInput};
use serde_json::{Map, Value};

/// Walks `path` (an array of object keys and array indices) through the
/// input, which may be a JSON value or a string containing JSON.
pub struct JsonParse;

fn path(params: &Map<String, Value>) -> Result<Vec<String>, AdapterError> {
    let items = params
        .get("path")
        .and_then(Value::as_array)
        .ok_or_else(|| AdapterError::missing_param("path"))?;

    items
        .iter()
        .map(|item| match item {
            Value::String(key) => Ok(key.clone()),
            Value::Number(n) if n.is_u64() => Ok(n.to_string()),
            other => Err(AdapterError::new(format!(
                "path elements must be strings or indices, got {}",
                other
            ))),
        })
        .collect()
}

fn step<'a>(value: &'a Value, key: &str) -> Option<&'a Value> {
    match value {
        Value::Object(map) => map.get(key),
        Value::Array(items) => key.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    }
}

#[async_trait]
impl Adapter for JsonParse {
    fn adapter_type(&self) -> &str {
        "JsonParse"
    }

    fn validate(&self, params: &Map<String, Value>) -> Result<(), AdapterError> {
        path(params).map(|_| ())
    }

    async fn perform(&self, input: &AdapterInput) -> Result<Value, AdapterError> {
        let keys = path(&input.params)?;
        let parsed;
        let document = match &input.data {
            Value::String(text) => {
                parsed = serde_json::from_str::<Value>(text)
                    .map_err(|e| AdapterError::new(format!("Invalid JSON input: {}", e)))?;
                &parsed
            }
            other => other,
        };

        let mut current = document;
        for (depth, key) in keys.iter().enumerate() {
            current = step(current, key).ok_or_else(|| {
                AdapterError::new(format!("No value at path {}", keys[..=depth].join(".")))
            })?;
        }
        Ok(current.clone())
    }
}
