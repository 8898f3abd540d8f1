//! Job HTTP route handlers.
//!
//! ```text
//! POST /jobs            - Create job
//! GET  /jobs            - List jobs
//! GET  /jobs/{id}       - Get job
//! GET  /jobs/{id}/runs  - List a job's runs
//! POST /jobs/{id}/runs  - Trigger a run
//! GET  /runs/{id}       - Get run
//! GET  /livez           - Liveness check
//! ```

use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::{Path, State, rejection::JsonRejection},
    routing::get,
};
use jobnode_core::{Job, JobId, JobRun, JobSpec, RunId, Trigger};
use serde::Serialize;
use serde_json::Value;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct JobListResponse {
    pub count: usize,
    pub jobs: Vec<Job>,
}

#[derive(Debug, Serialize)]
pub struct RunListResponse {
    pub count: usize,
    pub runs: Vec<JobRun>,
}

pub fn create_router(state: Arc<AppState>) -> Router {
    let job_router = Router::new()
        .route("/", get(list_jobs).post(create_job))
        .route("/{id}", get(get_job))
        .route("/{id}/runs", get(list_job_runs).post(trigger_run))
        .with_state(state.clone());

    let run_router = Router::new()
        .route("/{id}", get(get_run))
        .with_state(state.clone());

    let health_router = Router::new()
        .route("/livez", get(liveness))
        .with_state(state);

    Router::new()
        .nest("/jobs", job_router)
        .nest("/runs", run_router)
        .merge(health_router)
        .layer(TraceLayer::new_for_http())
}

/// POST /jobs
pub async fn create_job(
    State(state): State<Arc<AppState>>,
    body: Result<Json<JobSpec>, JsonRejection>,
) -> Result<Json<Job>, ApiError> {
    let Json(spec) = body.map_err(|e| ApiError::BadRequest(e.body_text()))?;

    let job = Job::build(spec, state.adapters()).inspect_err(|e| {
        warn!("Rejected job definition: {}", e);
    })?;
    state.store().save_job(&job).await?;
    info!("Created job {} ({} tasks)", job.id, job.tasks.len());

    if let Some(scheduler) = &state.scheduler {
        scheduler.add_job(job.clone()).await?;
    }

    Ok(Json(job))
}

/// GET /jobs
pub async fn list_jobs(
    State(state): State<Arc<AppState>>,
) -> Result<Json<JobListResponse>, ApiError> {
    let jobs = state.store().jobs().await?;
    Ok(Json(JobListResponse {
        count: jobs.len(),
        jobs,
    }))
}

/// GET /jobs/{id}
pub async fn get_job(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Job>, ApiError> {
    find_job(&state, id).await.map(Json)
}

/// GET /jobs/{id}/runs
pub async fn list_job_runs(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<RunListResponse>, ApiError> {
    let job = find_job(&state, id).await?;
    let runs = state.store().job_runs_for(&job.id).await?;
    Ok(Json(RunListResponse {
        count: runs.len(),
        runs,
    }))
}

/// POST /jobs/{id}/runs
///
/// An optional JSON body becomes the first task's input. Answers with the
/// in-progress run; the pipeline continues in the background.
pub async fn trigger_run(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<Json<JobRun>, ApiError> {
    let job = find_job(&state, id).await?;
    let input = parse_input(&body)?;

    let run = state.executor.begin(&job, Trigger::External).await?;
    info!("Job {} triggered externally, run {}", job.id, run.id);

    let executor = state.executor.clone();
    let pending = run.clone();
    state.runs().spawn(async move {
        if let Err(e) = executor.run(&job, pending, input).await {
            warn!("Run for job {} aborted: {}", job.id, e);
        }
    });

    Ok(Json(run))
}

/// GET /runs/{id}
pub async fn get_run(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<JobRun>, ApiError> {
    state
        .store()
        .job_run(&RunId::from(id))
        .await?
        .map(Json)
        .ok_or(ApiError::NotFound("Run"))
}

/// GET /livez
pub async fn liveness(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(serde_json::json!({
        "status": "alive",
        "uptime_seconds": state.uptime().as_secs()
    }))
}

async fn find_job(state: &AppState, id: String) -> Result<Job, ApiError> {
    state
        .store()
        .job(&JobId::from(id))
        .await?
        .ok_or(ApiError::NotFound("Job"))
}

fn parse_input(body: &[u8]) -> Result<Value, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Null);
    }
    serde_json::from_slice(body).map_err(|e| ApiError::BadRequest(format!("Invalid JSON body: {}", e)))
}

#[cfg(test)]
#[path = "routes_tests.rs"]
mod tests;
