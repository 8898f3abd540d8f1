use async_trait::async_trait;
use jobnode_core::{Adapter, AdapterError, AdapterInput};
use serde_json::Value;

/// Passes its input through unchanged.
pub struct NoOp;

#[async_trait]
impl Adapter for NoOp {
    fn adapter_type(&self) -> &str {
        "NoOp"
    }

    async fn perform(&self, input: &AdapterInput) -> Result<Value, AdapterError> {
        Ok(input.data.clone())
    }
}
