//! Ethereum transaction adapter.

use std::sync::Arc;

use async_trait::async_trait;
use jobnode_core::{Adapter, AdapterError, AdapterInput};
use reqwest::Client;
use serde_json::{Map, Value, json};
use tracing::{debug, info};
use url::Url;

const WORD_SIZE: usize = 32;

/// Sends a transaction and returns its hash.
#[async_trait]
pub trait TransactionSubmitter: Send + Sync {
    async fn submit(&self, to: &str, data: &str) -> Result<String, AdapterError>;
}

/// Submits through `eth_sendTransaction` on a JSON-RPC node, which signs
/// with its own unlocked account.
pub struct JsonRpcSubmitter {
    client: Client,
    url: Url,
}

impl JsonRpcSubmitter {
    pub fn new(client: Client, url: Url) -> Self {
        Self { client, url }
    }
}

#[async_trait]
impl TransactionSubmitter for JsonRpcSubmitter {
    async fn submit(&self, to: &str, data: &str) -> Result<String, AdapterError> {
        let request = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "eth_sendTransaction",
            "params": [{"to": to, "data": data}],
        });

        let response: Value = self
            .client
            .post(self.url.clone())
            .json(&request)
            .send()
            .await
            .map_err(|e| AdapterError::new(format!("RPC request failed: {}", e)))?
            .json()
            .await
            .map_err(|e| AdapterError::new(format!("Invalid RPC response: {}", e)))?;

        if let Some(error) = response.get("error") {
            let message = error
                .get("message")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| error.to_string());
            return Err(AdapterError::new(format!("RPC error: {}", message)));
        }

        response
            .get("result")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| AdapterError::new("RPC response has no transaction hash"))
    }
}

/// Writes the input as a right-padded 32-byte word to a contract function.
///
/// The transaction data is `functionId` followed by the word; the result is
/// the transaction hash.
pub struct EthBytes32 {
    submitter: Option<Arc<dyn TransactionSubmitter>>,
}

impl EthBytes32 {
    pub fn new(submitter: Option<Arc<dyn TransactionSubmitter>>) -> Self {
        Self { submitter }
    }
}

struct Target {
    address: String,
    function_id: String,
}

fn strip_hex_prefix(s: &str) -> &str {
    s.strip_prefix("0x").unwrap_or(s)
}

fn target(params: &Map<String, Value>) -> Result<Target, AdapterError> {
    let address = params
        .get("address")
        .and_then(Value::as_str)
        .ok_or_else(|| AdapterError::missing_param("address"))?;
    let address_bytes = hex::decode(strip_hex_prefix(address))
        .map_err(|e| AdapterError::new(format!("invalid address '{}': {}", address, e)))?;
    if address_bytes.len() != 20 {
        return Err(AdapterError::new(format!(
            "invalid address '{}': expected 20 bytes",
            address
        )));
    }

    let function_id = params
        .get("functionId")
        .and_then(Value::as_str)
        .ok_or_else(|| AdapterError::missing_param("functionId"))?;
    let function_bytes = hex::decode(strip_hex_prefix(function_id))
        .map_err(|e| AdapterError::new(format!("invalid functionId '{}': {}", function_id, e)))?;
    if function_bytes.len() != 4 {
        return Err(AdapterError::new(format!(
            "invalid functionId '{}': expected 4 bytes",
            function_id
        )));
    }

    Ok(Target {
        address: format!("0x{}", hex::encode(address_bytes)),
        function_id: hex::encode(function_bytes),
    })
}

/// Encode text as a hex word, right-padded with zeros to 32 bytes.
fn bytes32(text: &str) -> Result<String, AdapterError> {
    let bytes = text.as_bytes();
    if bytes.len() > WORD_SIZE {
        return Err(AdapterError::new(format!(
            "value is {} bytes, longer than {}",
            bytes.len(),
            WORD_SIZE
        )));
    }
    let mut word = [0u8; WORD_SIZE];
    word[..bytes.len()].copy_from_slice(bytes);
    Ok(hex::encode(word))
}

#[async_trait]
impl Adapter for EthBytes32 {
    fn adapter_type(&self) -> &str {
        "EthBytes32"
    }

    fn validate(&self, params: &Map<String, Value>) -> Result<(), AdapterError> {
        target(params).map(|_| ())
    }

    async fn perform(&self, input: &AdapterInput) -> Result<Value, AdapterError> {
        let target = target(&input.params)?;
        let word = bytes32(&input.data_as_text())?;
        let submitter = self
            .submitter
            .as_ref()
            .ok_or_else(|| AdapterError::new("no Ethereum node configured"))?;

        let data = format!("0x{}{}", target.function_id, word);
        debug!("EthBytes32 to {} data {}", target.address, data);
        let hash = submitter.submit(&target.address, &data).await?;
        info!("Submitted transaction {} to {}", hash, target.address);
        Ok(Value::String(hash))
    }
}

#[cfg(test)]
#[path = "eth_tests.rs"]
mod tests;
