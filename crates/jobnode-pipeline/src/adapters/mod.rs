//! Built-in adapters.
//!
//! | Type | Params |
//! |------|--------|
//! | `HttpGet` | `endpoint` |
//! | `HttpPost` | `endpoint` |
//! | `JsonParse` | `path` |
//! | `Multiply` | `times` |
//! | `NoOp` | |
//! | `EthBytes32` | `address`, `functionId` |

mod eth;
mod http;
mod json_parse;
mod multiply;
mod noop;

use std::sync::Arc;
use std::time::Duration;

use jobnode_core::AdapterRegistry;
use reqwest::Client;
use url::Url;

use crate::error::PipelineError;

pub use eth::{EthBytes32, JsonRpcSubmitter, TransactionSubmitter};
pub use http::{HttpGet, HttpPost};
pub use json_parse::JsonParse;
pub use multiply::Multiply;
pub use noop::NoOp;

/// Settings shared by the built-in adapters.
#[derive(Debug, Clone)]
pub struct AdapterSettings {
    /// Timeout for outbound HTTP requests.
    pub http_timeout: Duration,

    /// Ethereum JSON-RPC endpoint. `EthBytes32` fails at run time without it.
    pub eth_url: Option<Url>,
}

impl Default for AdapterSettings {
    fn default() -> Self {
        Self {
            http_timeout: Duration::from_secs(30),
            eth_url: None,
        }
    }
}

/// Build a registry containing every built-in adapter.
pub fn default_registry(settings: &AdapterSettings) -> Result<AdapterRegistry, PipelineError> {
    let client = Client::builder()
        .timeout(settings.http_timeout)
        .user_agent(concat!("jobnode/", env!("CARGO_PKG_VERSION")))
        .build()?;

    let submitter: Option<Arc<dyn TransactionSubmitter>> = settings
        .eth_url
        .clone()
        .map(|url| Arc::new(JsonRpcSubmitter::new(client.clone(), url)) as Arc<dyn TransactionSubmitter>);

    let registry = AdapterRegistry::new();
    registry.register(Arc::new(HttpGet::new(client.clone())))?;
    registry.register(Arc::new(HttpPost::new(client)))?;
    registry.register(Arc::new(JsonParse))?;
    registry.register(Arc::new(Multiply))?;
    registry.register(Arc::new(NoOp))?;
    registry.register(Arc::new(EthBytes32::new(submitter)))?;
    Ok(registry)
}
