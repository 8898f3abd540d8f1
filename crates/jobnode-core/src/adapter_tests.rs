use super::*;
use serde_json::json;

struct Echo;

#[async_trait]
impl Adapter for Echo {
    fn adapter_type(&self) -> &str {
        "Echo"
    }

    fn validate(&self, params: &Map<String, Value>) -> Result<(), AdapterError> {
        if params.contains_key("forbidden") {
            return Err(AdapterError::new("forbidden param"));
        }
        Ok(())
    }

    async fn perform(&self, input: &AdapterInput) -> Result<Value, AdapterError> {
        Ok(input.data.clone())
    }
}

#[test]
fn test_register_and_get() {
    let registry = AdapterRegistry::new();
    assert!(registry.is_empty());

    registry.register(Arc::new(Echo)).unwrap();
    assert!(registry.contains("Echo"));
    assert!(registry.get("Echo").is_some());
    assert!(registry.get("Missing").is_none());
    assert_eq!(registry.types(), vec!["Echo".to_string()]);
    assert_eq!(registry.len(), 1);
}

#[test]
fn test_duplicate_registration_rejected() {
    let registry = AdapterRegistry::new();
    registry.register(Arc::new(Echo)).unwrap();
    let err = registry.register(Arc::new(Echo)).unwrap_err();
    assert_eq!(err, RegistryError::AlreadyRegistered("Echo".to_string()));
}

#[tokio::test]
async fn test_perform_through_registry() {
    let registry = AdapterRegistry::new();
    registry.register(Arc::new(Echo)).unwrap();

    let adapter = registry.get("Echo").unwrap();
    let output = adapter
        .perform(&AdapterInput::new(json!({"a": 1}), Map::new()))
        .await
        .unwrap();
    assert_eq!(output, json!({"a": 1}));
}

#[test]
fn test_validate_default_and_custom() {
    let mut params = Map::new();
    assert!(Echo.validate(&params).is_ok());
    params.insert("forbidden".to_string(), json!(true));
    assert_eq!(Echo.validate(&params).unwrap_err().to_string(), "forbidden param");
}

#[test]
fn test_input_param_helpers() {
    let mut params = Map::new();
    params.insert("endpoint".to_string(), json!("http://localhost"));
    params.insert("times".to_string(), json!(100));
    let input = AdapterInput::new(json!("hello"), params);

    assert_eq!(input.str_param("endpoint").unwrap(), "http://localhost");
    assert_eq!(
        input.str_param("times").unwrap_err().to_string(),
        "missing required param 'times'"
    );
    assert_eq!(input.param("times"), Some(&json!(100)));
    assert_eq!(input.data_as_text(), "hello");
}

#[test]
fn test_data_as_text() {
    assert_eq!(AdapterInput::default().data_as_text(), "");
    let input = AdapterInput::new(json!({"k": "v"}), Map::new());
    assert_eq!(input.data_as_text(), r#"{"k":"v"}"#);
}
