//! Runs the API server with a live scheduler and a mocked price feed.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use jobnode_api::{ApiConfig, ApiServer, AppState};
use jobnode_core::MemoryJobStore;
use jobnode_pipeline::{AdapterSettings, TaskPipelineExecutor, default_registry};
use jobnode_scheduler::{Scheduler, SchedulerConfig};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TICKER: &str = r#"{"high": "10744.00", "last": "10583.75", "timestamp": "1512156162", "bid": "10555.13", "vwap": "10097.98", "volume": "17861.33960013", "low": "9370.11", "ask": "10583.00", "open": "9927.29"}"#;

struct Node {
    base: String,
    client: reqwest::Client,
    scheduler: Arc<Scheduler>,
    shutdown: Option<oneshot::Sender<()>>,
    handle: tokio::task::JoinHandle<std::io::Result<()>>,
}

impl Node {
    async fn start() -> Self {
        let registry = Arc::new(default_registry(&AdapterSettings::default()).unwrap());
        let executor = TaskPipelineExecutor::new(Arc::new(MemoryJobStore::new()), registry);
        let scheduler = Arc::new(Scheduler::new(executor.clone(), SchedulerConfig::default()));
        scheduler.start().await.unwrap();

        let state = Arc::new(AppState::new(executor, Some(scheduler.clone())));
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        let (tx, rx) = oneshot::channel::<()>();
        let server = ApiServer::new(ApiConfig::default(), state);
        let handle = tokio::spawn(async move {
            server
                .serve(listener, async {
                    let _ = rx.await;
                })
                .await
        });

        Self {
            base,
            client: reqwest::Client::new(),
            scheduler,
            shutdown: Some(tx),
            handle,
        }
    }

    async fn post(&self, uri: &str, body: Value) -> (u16, Value) {
        let response = self
            .client
            .post(format!("{}{}", self.base, uri))
            .json(&body)
            .send()
            .await
            .unwrap();
        let status = response.status().as_u16();
        (status, response.json().await.unwrap())
    }

    async fn get(&self, uri: &str) -> (u16, Value) {
        let response = self
            .client
            .get(format!("{}{}", self.base, uri))
            .send()
            .await
            .unwrap();
        let status = response.status().as_u16();
        (status, response.json().await.unwrap())
    }

    async fn wait_for_runs(&self, job_id: &str) -> Value {
        for _ in 0..100 {
            let (_, body) = self.get(&format!("/jobs/{}/runs", job_id)).await;
            let done = body["runs"]
                .as_array()
                .is_some_and(|runs| !runs.is_empty() && runs.iter().all(|r| r["status"] == "completed" || r["status"] == "errored"));
            if done {
                return body;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        panic!("job {} never produced a finished run", job_id);
    }

    async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        self.handle.await.unwrap().unwrap();
        self.scheduler.stop().await.unwrap();
    }
}

#[tokio::test]
async fn test_scheduled_fetch_and_parse() {
    let feed = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/ticker"))
        .respond_with(ResponseTemplate::new(200).set_body_string(TICKER))
        .mount(&feed)
        .await;

    let node = Node::start().await;
    let run_at = Utc::now() + chrono::Duration::milliseconds(300);
    let (status, job) = node
        .post(
            "/jobs",
            json!({
                "tasks": [
                    {"type": "HttpGet", "params": {"endpoint": format!("{}/api/ticker", feed.uri())}},
                    {"type": "JsonParse", "params": {"path": ["last"]}}
                ],
                "schedule": {"runAt": [run_at.to_rfc3339()]}
            }),
        )
        .await;
    assert_eq!(status, 200);
    let job_id = job["id"].as_str().unwrap().to_string();

    let body = node.wait_for_runs(&job_id).await;
    assert_eq!(body["count"], 1);
    let run = &body["runs"][0];
    assert_eq!(run["status"], "completed");
    assert_eq!(run["trigger"]["type"], "runAt");
    assert_eq!(run["task_runs"][0]["result"], json!(TICKER));
    assert_eq!(run["task_runs"][1]["result"], json!("10583.75"));

    let (status, shown) = node.get(&format!("/jobs/{}", job_id)).await;
    assert_eq!(status, 200);
    assert_eq!(shown["id"], job_id.as_str());

    node.shutdown().await;
}

#[tokio::test]
async fn test_external_trigger_runs_pipeline() {
    let feed = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/ticker"))
        .respond_with(ResponseTemplate::new(200).set_body_string(TICKER))
        .expect(1)
        .mount(&feed)
        .await;

    let node = Node::start().await;
    let (_, job) = node
        .post(
            "/jobs",
            json!({
                "tasks": [
                    {"type": "HttpGet", "params": {"endpoint": format!("{}/api/ticker", feed.uri())}},
                    {"type": "JsonParse", "params": {"path": ["last"]}},
                    {"type": "Multiply", "params": {"times": 100}}
                ]
            }),
        )
        .await;
    let job_id = job["id"].as_str().unwrap().to_string();

    let (status, run) = node.post(&format!("/jobs/{}/runs", job_id), Value::Null).await;
    assert_eq!(status, 200);
    assert_eq!(run["status"], "inProgress");

    let body = node.wait_for_runs(&job_id).await;
    assert_eq!(body["runs"][0]["result"], json!("1058375"));

    node.shutdown().await;
}

#[tokio::test]
async fn test_rejected_definitions() {
    let node = Node::start().await;

    let (status, body) = node
        .post("/jobs", json!({"tasks": [{"type": "IdoNotExist"}]}))
        .await;
    assert_eq!(status, 500);
    assert_eq!(body, json!({"errors": ["IdoNotExist is not a supported adapter type"]}));

    let (status, body) = node
        .post(
            "/jobs",
            json!({"tasks": [{"type": "NoOp"}], "schedule": {"cron": "9 9 9 9 !"}}),
        )
        .await;
    assert_eq!(status, 500);
    assert!(body["errors"][0].as_str().unwrap().starts_with("Cron: Failed to parse int from !"));

    let (status, body) = node.get("/jobs").await;
    assert_eq!(status, 200);
    assert_eq!(body["count"], 0);

    let (status, _) = node.get("/jobs/unknown").await;
    assert_eq!(status, 404);

    node.shutdown().await;
}
