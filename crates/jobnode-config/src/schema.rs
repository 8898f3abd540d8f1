//! Configuration schema definitions.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::loader::ConfigLoader;

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub scheduler: SchedulerSection,

    #[serde(default)]
    pub adapters: AdaptersConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// HTTP API listener.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    6688
}

/// Which job store to use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Memory,
    #[default]
    File,
}

/// Job store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: StoreBackend,

    /// Root directory of the file store. `~` is expanded.
    #[serde(default = "default_store_path")]
    pub path: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            path: default_store_path(),
        }
    }
}

impl StoreConfig {
    pub fn resolved_path(&self) -> PathBuf {
        PathBuf::from(ConfigLoader::expand_path(&self.path))
    }
}

fn default_store_path() -> String {
    "~/.jobnode/store".to_string()
}

/// `[scheduler]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchedulerSection {
    /// Fire one-off instants that had already passed when their job was
    /// registered.
    #[serde(default)]
    pub catch_up_missed_run_at: bool,
}

/// Settings for the built-in adapters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdaptersConfig {
    #[serde(default = "default_http_timeout")]
    pub http_timeout_secs: u64,

    /// Ethereum JSON-RPC endpoint used by `EthBytes32`.
    #[serde(default)]
    pub eth_url: Option<String>,
}

impl Default for AdaptersConfig {
    fn default() -> Self {
        Self {
            http_timeout_secs: default_http_timeout(),
            eth_url: None,
        }
    }
}

fn default_http_timeout() -> u64 {
    30
}

/// Log output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Filter used when `RUST_LOG` is unset.
    #[serde(default = "default_level")]
    pub level: String,

    /// Emit JSON lines on the console instead of text.
    #[serde(default)]
    pub json: bool,

    /// Directory for daily-rotated log files. No file output when unset.
    #[serde(default)]
    pub dir: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            json: false,
            dir: None,
        }
    }
}

impl LoggingConfig {
    pub fn resolved_dir(&self) -> Option<PathBuf> {
        self.dir
            .as_deref()
            .map(|dir| PathBuf::from(ConfigLoader::expand_path(dir)))
    }
}

fn default_level() -> String {
    "info".to_string()
}

#[cfg(test)]
#[path = "schema_tests.rs"]
mod tests;
