use super::*;
use crate::job::{Schedule, TaskSpec};
use crate::run::Trigger;
use serde_json::json;
use std::sync::Arc;
use tempfile::TempDir;

fn sample_job() -> Job {
    Job::new(
        vec![TaskSpec::new("NoOp")],
        Schedule::cron("9 9 9 9 6"),
    )
}

async fn exercise_store(store: Arc<dyn JobStore>) {
    let job = sample_job();
    let other = sample_job();
    store.save_job(&job).await.unwrap();
    store.save_job(&other).await.unwrap();

    let loaded = store.job(&job.id).await.unwrap().unwrap();
    assert_eq!(loaded, job);
    assert!(store.job(&JobId::from("garbage")).await.unwrap().is_none());

    let all = store.jobs().await.unwrap();
    assert_eq!(all.len(), 2);
    assert_eq!(all[0].id, job.id);

    let mut first = JobRun::new(job.id.clone(), Trigger::External);
    first.start();
    store.save_job_run(&first).await.unwrap();
    let second = JobRun::new(job.id.clone(), Trigger::External);
    store.save_job_run(&second).await.unwrap();
    store
        .save_job_run(&JobRun::new(other.id.clone(), Trigger::External))
        .await
        .unwrap();

    // Re-saving replaces the record without changing its position.
    first.start_task(TaskSpec::new("NoOp")).unwrap().complete(json!("done"));
    first.complete(json!("done"));
    store.save_job_run(&first).await.unwrap();

    let runs = store.job_runs_for(&job.id).await.unwrap();
    assert_eq!(runs.len(), 2);
    assert_eq!(runs[0].id, first.id);
    assert_eq!(runs[0].result, Some(json!("done")));
    assert_eq!(runs[1].id, second.id);

    let loaded = store.job_run(&first.id).await.unwrap().unwrap();
    assert_eq!(loaded, first);
    assert!(store.job_run(&RunId::from("missing")).await.unwrap().is_none());
}

#[tokio::test]
async fn test_memory_store() {
    exercise_store(Arc::new(MemoryJobStore::new())).await;
}

#[tokio::test]
async fn test_file_store() {
    let dir = TempDir::new().unwrap();
    let store = FileJobStore::new(dir.path()).await.unwrap();
    exercise_store(Arc::new(store)).await;
}

#[tokio::test]
async fn test_file_store_survives_reopen() {
    let dir = TempDir::new().unwrap();
    let job = sample_job();
    {
        let store = FileJobStore::new(dir.path()).await.unwrap();
        store.save_job(&job).await.unwrap();
    }

    let store = FileJobStore::new(dir.path()).await.unwrap();
    let jobs = store.jobs().await.unwrap();
    assert_eq!(jobs, vec![job]);
}

#[tokio::test]
async fn test_file_store_skips_corrupt_records() {
    let dir = TempDir::new().unwrap();
    let store = FileJobStore::new(dir.path()).await.unwrap();
    store.save_job(&sample_job()).await.unwrap();
    tokio::fs::write(dir.path().join("jobs").join("broken.json"), "{not json")
        .await
        .unwrap();

    assert_eq!(store.jobs().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_file_store_leaves_no_temp_files() {
    let dir = TempDir::new().unwrap();
    let store = FileJobStore::new(dir.path()).await.unwrap();
    store.save_job(&sample_job()).await.unwrap();

    let mut entries = tokio::fs::read_dir(dir.path().join("jobs")).await.unwrap();
    while let Some(entry) = entries.next_entry().await.unwrap() {
        let name = entry.file_name().to_string_lossy().to_string();
        assert!(name.ends_with(".json"), "unexpected file {}", name);
    }
}

#[tokio::test]
async fn test_file_store_lists_in_insertion_order_within_one_tick() {
    let dir = TempDir::new().unwrap();
    let mut later = sample_job();
    later.id = JobId::from("zzz");
    let mut earlier = sample_job();
    earlier.id = JobId::from("aaa");
    earlier.created_at = later.created_at;

    let mut first = JobRun::new(later.id.clone(), Trigger::External);
    first.id = RunId::from("run-z");
    let mut second = JobRun::new(later.id.clone(), Trigger::External);
    second.id = RunId::from("run-a");
    second.created_at = first.created_at;

    {
        let store = FileJobStore::new(dir.path()).await.unwrap();
        store.save_job(&later).await.unwrap();
        store.save_job(&earlier).await.unwrap();
        store.save_job_run(&first).await.unwrap();
        store.save_job_run(&second).await.unwrap();
        store.save_job(&later).await.unwrap();

        let ids: Vec<_> = store.jobs().await.unwrap().into_iter().map(|j| j.id).collect();
        assert_eq!(ids, vec![later.id.clone(), earlier.id.clone()]);
    }

    // Positions survive a reopen, and new records go after the old ones.
    let store = FileJobStore::new(dir.path()).await.unwrap();
    let mut newest = sample_job();
    newest.id = JobId::from("000");
    newest.created_at = later.created_at;
    store.save_job(&newest).await.unwrap();

    let ids: Vec<_> = store.jobs().await.unwrap().into_iter().map(|j| j.id).collect();
    assert_eq!(ids, vec![later.id.clone(), earlier.id.clone(), newest.id.clone()]);

    let runs: Vec<_> = store
        .job_runs_for(&later.id)
        .await
        .unwrap()
        .into_iter()
        .map(|r| r.id)
        .collect();
    assert_eq!(runs, vec![first.id, second.id]);
}
