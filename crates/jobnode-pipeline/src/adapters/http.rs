//! HTTP fetch adapters.

use async_trait::async_trait;
use jobnode_core::{Adapter, AdapterError, AdapterInput};
use reqwest::{Client, RequestBuilder};
use serde_json::{Map, Value};
use tracing::debug;
use url::Url;

fn endpoint(params: &Map<String, Value>) -> Result<Url, AdapterError> {
    let raw = params
        .get("endpoint")
        .and_then(Value::as_str)
        .ok_or_else(|| AdapterError::missing_param("endpoint"))?;
    Url::parse(raw).map_err(|e| AdapterError::new(format!("invalid endpoint '{}': {}", raw, e)))
}

/// Send the request and return the body as a string. Non-2xx fails.
async fn send(request: RequestBuilder) -> Result<Value, AdapterError> {
    let response = request
        .send()
        .await
        .map_err(|e| AdapterError::new(format!("Request failed: {}", e)))?;

    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| AdapterError::new(format!("Failed to read body: {}", e)))?;

    if !status.is_success() {
        return Err(AdapterError::new(format!(
            "Request failed with status {}: {}",
            status.as_u16(),
            body
        )));
    }
    Ok(Value::String(body))
}

/// GETs `endpoint`; the response body is the result.
pub struct HttpGet {
    client: Client,
}

impl HttpGet {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Adapter for HttpGet {
    fn adapter_type(&self) -> &str {
        "HttpGet"
    }

    fn validate(&self, params: &Map<String, Value>) -> Result<(), AdapterError> {
        endpoint(params).map(|_| ())
    }

    async fn perform(&self, input: &AdapterInput) -> Result<Value, AdapterError> {
        let url = endpoint(&input.params)?;
        debug!("HttpGet {}", url);
        send(self.client.get(url)).await
    }
}

/// POSTs the input as JSON to `endpoint`; the response body is the result.
pub struct HttpPost {
    client: Client,
}

impl HttpPost {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Adapter for HttpPost {
    fn adapter_type(&self) -> &str {
        "HttpPost"
    }

    fn validate(&self, params: &Map<String, Value>) -> Result<(), AdapterError> {
        endpoint(params).map(|_| ())
    }

    async fn perform(&self, input: &AdapterInput) -> Result<Value, AdapterError> {
        let url = endpoint(&input.params)?;
        debug!("HttpPost {}", url);
        send(self.client.post(url).json(&input.data)).await
    }
}

#[cfg(test)]
#[path = "http_tests.rs"]
mod tests;
