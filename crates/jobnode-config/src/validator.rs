//! Configuration validation.

use url::Url;

use crate::error::ConfigError;
use crate::schema::{Config, StoreBackend};

/// Validation result.
#[derive(Debug, Default)]
pub struct ValidationResult {
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<ValidationWarning>,
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn add_error(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    pub fn add_warning(&mut self, warning: ValidationWarning) {
        self.warnings.push(warning);
    }

    /// Collapse the errors into a single [`ConfigError::Invalid`].
    pub fn into_result(self) -> Result<Vec<ValidationWarning>, ConfigError> {
        if self.is_valid() {
            return Ok(self.warnings);
        }
        let message = self
            .errors
            .iter()
            .map(|e| format!("{}: {}", e.path, e.message))
            .collect::<Vec<_>>()
            .join("; ");
        Err(ConfigError::Invalid(message))
    }
}

/// A validation error.
#[derive(Debug)]
pub struct ValidationError {
    pub path: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// A validation warning.
#[derive(Debug)]
pub struct ValidationWarning {
    pub path: String,
    pub message: String,
}

impl ValidationWarning {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Configuration validator.
pub struct ConfigValidator;

impl ConfigValidator {
    pub fn validate(config: &Config) -> Result<ValidationResult, ConfigError> {
        let mut result = ValidationResult::default();

        Self::validate_server(config, &mut result);
        Self::validate_store(config, &mut result);
        Self::validate_adapters(config, &mut result);
        Self::validate_logging(config, &mut result);

        Ok(result)
    }

    fn validate_server(config: &Config, result: &mut ValidationResult) {
        if config.server.port == 0 {
            result.add_error(ValidationError::new("server.port", "Port cannot be 0"));
        }

        if config.server.host.trim().is_empty() {
            result.add_error(ValidationError::new("server.host", "Host cannot be empty"));
        }
    }

    fn validate_store(config: &Config, result: &mut ValidationResult) {
        match config.store.backend {
            StoreBackend::File => {
                if config.store.path.trim().is_empty() {
                    result.add_error(ValidationError::new(
                        "store.path",
                        "File store requires a path",
                    ));
                }
            }
            StoreBackend::Memory => {
                result.add_warning(ValidationWarning::new(
                    "store.backend",
                    "Memory store is not durable; jobs and runs are lost on restart",
                ));
            }
        }
    }

    fn validate_adapters(config: &Config, result: &mut ValidationResult) {
        if config.adapters.http_timeout_secs == 0 {
            result.add_error(ValidationError::new(
                "adapters.http_timeout_secs",
                "http_timeout_secs must be greater than 0",
            ));
        }

        if let Some(eth_url) = &config.adapters.eth_url {
            match Url::parse(eth_url) {
                Ok(url) if matches!(url.scheme(), "http" | "https") => {}
                Ok(url) => result.add_error(ValidationError::new(
                    "adapters.eth_url",
                    format!("Unsupported scheme '{}', expected http or https", url.scheme()),
                )),
                Err(e) => result.add_error(ValidationError::new(
                    "adapters.eth_url",
                    format!("Invalid URL: {}", e),
                )),
            }
        }
    }

    fn validate_logging(config: &Config, result: &mut ValidationResult) {
        if config.logging.level.trim().is_empty() {
            result.add_error(ValidationError::new(
                "logging.level",
                "Log level cannot be empty",
            ));
        }
    }
}

#[cfg(test)]
#[path = "validator_tests.rs"]
mod tests;
