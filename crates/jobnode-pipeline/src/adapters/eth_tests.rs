use super::*;
use tokio::sync::Mutex;
use wiremock::matchers::{body_partial_json, method};
use wiremock::{Mock, MockServer, ResponseTemplate};

const ADDRESS: &str = "0x356a04bce728ba4c62a30294a55e6a8600a320b3";

#[derive(Default)]
struct RecordingSubmitter {
    calls: Mutex<Vec<(String, String)>>,
}

#[async_trait]
impl TransactionSubmitter for RecordingSubmitter {
    async fn submit(&self, to: &str, data: &str) -> Result<String, AdapterError> {
        self.calls.lock().await.push((to.to_string(), data.to_string()));
        Ok("0xhash".to_string())
    }
}

fn params() -> Map<String, Value> {
    let mut params = Map::new();
    params.insert("address".to_string(), json!(ADDRESS));
    params.insert("functionId".to_string(), json!("12345679"));
    params
}

#[test]
fn test_bytes32_right_pads() {
    let word = bytes32("10583.75").unwrap();
    assert_eq!(word.len(), 64);
    assert!(word.starts_with(&hex::encode("10583.75")));
    assert!(word.ends_with("0000"));
    assert!(bytes32(&"x".repeat(33)).is_err());
    assert_eq!(bytes32("").unwrap(), "0".repeat(64));
}

#[test]
fn test_validate() {
    let adapter = EthBytes32::new(None);
    assert!(adapter.validate(&params()).is_ok());

    let mut missing = params();
    missing.remove("functionId");
    assert_eq!(
        adapter.validate(&missing).unwrap_err().to_string(),
        "missing required param 'functionId'"
    );

    let mut bad = params();
    bad.insert("address".to_string(), json!("0x1234"));
    assert!(adapter.validate(&bad).is_err());
}

#[tokio::test]
async fn test_perform_submits_function_call() {
    let submitter = Arc::new(RecordingSubmitter::default());
    let shared: Arc<dyn TransactionSubmitter> = submitter.clone();
    let adapter = EthBytes32::new(Some(shared));

    let output = adapter
        .perform(&AdapterInput::new(json!("10583.75"), params()))
        .await
        .unwrap();
    assert_eq!(output, json!("0xhash"));

    let calls = submitter.calls.lock().await;
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].0, ADDRESS);
    assert_eq!(calls[0].1, format!("0x12345679{}", bytes32("10583.75").unwrap()));
}

#[tokio::test]
async fn test_perform_without_submitter_fails() {
    let adapter = EthBytes32::new(None);
    let err = adapter
        .perform(&AdapterInput::new(json!("1"), params()))
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "no Ethereum node configured");
}

#[tokio::test]
async fn test_json_rpc_submitter() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({"method": "eth_sendTransaction"})))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"jsonrpc": "2.0", "id": 1, "result": "0xabc"})),
        )
        .mount(&server)
        .await;

    let submitter = JsonRpcSubmitter::new(Client::new(), Url::parse(&server.uri()).unwrap());
    let hash = submitter.submit(ADDRESS, "0x00").await.unwrap();
    assert_eq!(hash, "0xabc");
}

#[tokio::test]
async fn test_json_rpc_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(
            json!({"jsonrpc": "2.0", "id": 1, "error": {"code": -32000, "message": "unknown account"}}),
        ))
        .mount(&server)
        .await;

    let submitter = JsonRpcSubmitter::new(Client::new(), Url::parse(&server.uri()).unwrap());
    let err = submitter.submit(ADDRESS, "0x00").await.unwrap_err();
    assert_eq!(err.to_string(), "RPC error: unknown account");
}
