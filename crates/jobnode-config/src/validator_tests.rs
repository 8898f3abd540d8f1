use super::*;

#[test]
fn test_default_config_is_valid() {
    let result = ConfigValidator::validate(&Config::default()).unwrap();
    assert!(result.is_valid());
    assert!(result.warnings.is_empty());
}

#[test]
fn test_zero_port() {
    let mut config = Config::default();
    config.server.port = 0;

    let result = ConfigValidator::validate(&config).unwrap();
    assert!(!result.is_valid());
    assert_eq!(result.errors[0].path, "server.port");
}

#[test]
fn test_empty_host() {
    let mut config = Config::default();
    config.server.host = "  ".to_string();

    let result = ConfigValidator::validate(&config).unwrap();
    assert!(result.errors.iter().any(|e| e.path == "server.host"));
}

#[test]
fn test_file_store_requires_path() {
    let mut config = Config::default();
    config.store.path = String::new();

    let result = ConfigValidator::validate(&config).unwrap();
    assert!(result.errors.iter().any(|e| e.path == "store.path"));
}

#[test]
fn test_memory_store_warns() {
    let mut config = Config::default();
    config.store.backend = StoreBackend::Memory;
    config.store.path = String::new();

    let result = ConfigValidator::validate(&config).unwrap();
    assert!(result.is_valid());
    assert_eq!(result.warnings.len(), 1);
    assert_eq!(result.warnings[0].path, "store.backend");
}

#[test]
fn test_zero_http_timeout() {
    let mut config = Config::default();
    config.adapters.http_timeout_secs = 0;

    let result = ConfigValidator::validate(&config).unwrap();
    assert!(result.errors.iter().any(|e| e.path == "adapters.http_timeout_secs"));
}

#[test]
fn test_eth_url_scheme() {
    let mut config = Config::default();
    config.adapters.eth_url = Some("ws://localhost:8546".to_string());
    let result = ConfigValidator::validate(&config).unwrap();
    assert!(result.errors[0].message.contains("ws"));

    config.adapters.eth_url = Some("not a url".to_string());
    let result = ConfigValidator::validate(&config).unwrap();
    assert!(result.errors[0].message.starts_with("Invalid URL"));

    config.adapters.eth_url = Some("https://mainnet.example.org".to_string());
    let result = ConfigValidator::validate(&config).unwrap();
    assert!(result.is_valid());
}

#[test]
fn test_into_result_joins_errors() {
    let mut config = Config::default();
    config.server.port = 0;
    config.logging.level = String::new();

    let err = ConfigValidator::validate(&config)
        .unwrap()
        .into_result()
        .unwrap_err();
    let message = err.to_string();
    assert!(message.contains("server.port: Port cannot be 0"));
    assert!(message.contains("logging.level"));
}

#[test]
fn test_into_result_returns_warnings() {
    let mut config = Config::default();
    config.store.backend = StoreBackend::Memory;

    let warnings = ConfigValidator::validate(&config)
        .unwrap()
        .into_result()
        .unwrap();
    assert_eq!(warnings.len(), 1);
}
