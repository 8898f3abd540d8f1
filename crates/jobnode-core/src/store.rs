//! Persistence for jobs and job runs.
//!
//! Every write stores one whole record keyed by its id; a later save of the
//! same id replaces it. Listings come back in insertion order.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::error::StoreError;
use crate::ids::{JobId, RunId};
use crate::job::Job;
use crate::run::JobRun;

/// Job store trait for persistence.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Insert or replace a job.
    async fn save_job(&self, job: &Job) -> Result<(), StoreError>;

    /// Load a job by id.
    async fn job(&self, id: &JobId) -> Result<Option<Job>, StoreError>;

    /// All jobs, oldest first.
    async fn jobs(&self) -> Result<Vec<Job>, StoreError>;

    /// Insert or replace a job run.
    async fn save_job_run(&self, run: &JobRun) -> Result<(), StoreError>;

    /// Load a job run by id.
    async fn job_run(&self, id: &RunId) -> Result<Option<JobRun>, StoreError>;

    /// All runs of one job, oldest first.
    async fn job_runs_for(&self, job_id: &JobId) -> Result<Vec<JobRun>, StoreError>;
}

#[derive(Default)]
struct MemoryState {
    jobs: HashMap<JobId, Job>,
    job_order: Vec<JobId>,
    runs: HashMap<RunId, JobRun>,
    run_order: Vec<RunId>,
}

/// In-memory job store.
#[derive(Default)]
pub struct MemoryJobStore {
    state: RwLock<MemoryState>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn save_job(&self, job: &Job) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        if state.jobs.insert(job.id.clone(), job.clone()).is_none() {
            state.job_order.push(job.id.clone());
        }
        Ok(())
    }

    async fn job(&self, id: &JobId) -> Result<Option<Job>, StoreError> {
        Ok(self.state.read().await.jobs.get(id).cloned())
    }

    async fn jobs(&self) -> Result<Vec<Job>, StoreError> {
        let state = self.state.read().await;
        Ok(state
            .job_order
            .iter()
            .filter_map(|id| state.jobs.get(id).cloned())
            .collect())
    }

    async fn save_job_run(&self, run: &JobRun) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        if state.runs.insert(run.id.clone(), run.clone()).is_none() {
            state.run_order.push(run.id.clone());
        }
        Ok(())
    }

    async fn job_run(&self, id: &RunId) -> Result<Option<JobRun>, StoreError> {
        Ok(self.state.read().await.runs.get(id).cloned())
    }

    async fn job_runs_for(&self, job_id: &JobId) -> Result<Vec<JobRun>, StoreError> {
        let state = self.state.read().await;
        Ok(state
            .run_order
            .iter()
            .filter_map(|id| state.runs.get(id))
            .filter(|run| &run.job_id == job_id)
            .cloned()
            .collect())
    }
}

/// On-disk form of a record: its own fields plus the position it was first
/// saved at. Files written without `seq` load with position zero.
#[derive(Serialize, Deserialize)]
struct Stored<T> {
    #[serde(default)]
    seq: u64,
    #[serde(flatten)]
    record: T,
}

#[derive(Deserialize)]
struct StoredSeq {
    #[serde(default)]
    seq: u64,
}

/// File system based job store.
///
/// Layout: `<root>/jobs/<job id>.json` and `<root>/runs/<run id>.json`.
/// Records are written to a temporary file and renamed into place. Each
/// record carries a sequence number assigned on its first save, which
/// orders listings.
pub struct FileJobStore {
    storage_path: PathBuf,
    seqs: DashMap<PathBuf, u64>,
    next_seq: AtomicU64,
}

impl FileJobStore {
    /// Open (creating if needed) a store rooted at `storage_path`.
    pub async fn new(storage_path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let storage_path = storage_path.into();
        fs::create_dir_all(storage_path.join("jobs")).await?;
        fs::create_dir_all(storage_path.join("runs")).await?;

        let seqs = DashMap::new();
        let mut last = 0;
        for dir in [storage_path.join("jobs"), storage_path.join("runs")] {
            for (path, seq) in Self::read_seqs(&dir).await? {
                last = last.max(seq);
                seqs.insert(path, seq);
            }
        }

        debug!("FileJobStore initialized at {:?} ({} records)", storage_path, seqs.len());
        Ok(Self {
            storage_path,
            seqs,
            next_seq: AtomicU64::new(last + 1),
        })
    }

    fn jobs_dir(&self) -> PathBuf {
        self.storage_path.join("jobs")
    }

    fn runs_dir(&self) -> PathBuf {
        self.storage_path.join("runs")
    }

    fn record_path(dir: &Path, id: &str) -> PathBuf {
        dir.join(format!("{}.json", Self::sanitize_id(id)))
    }

    fn sanitize_id(id: &str) -> String {
        id.chars()
            .map(|c| {
                if c.is_alphanumeric() || c == '-' || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect()
    }

    /// Sequence for the record at `path`, allocating one on first use.
    fn seq_for(&self, path: &Path) -> u64 {
        *self
            .seqs
            .entry(path.to_path_buf())
            .or_insert_with(|| self.next_seq.fetch_add(1, Ordering::SeqCst))
    }

    async fn write_record<T: Serialize + Sync>(
        &self,
        path: &Path,
        record: &T,
    ) -> Result<(), StoreError> {
        let stored = Stored {
            seq: self.seq_for(path),
            record,
        };
        let content = serde_json::to_vec_pretty(&stored)?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, content).await?;
        fs::rename(&tmp, path).await?;
        Ok(())
    }

    async fn read_record<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, StoreError> {
        match fs::read(path).await {
            Ok(content) => Ok(Some(serde_json::from_slice::<Stored<T>>(&content)?.record)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Record files in `dir`.
    async fn record_files(dir: &Path) -> Result<Vec<PathBuf>, StoreError> {
        let mut paths = Vec::new();
        let mut entries = fs::read_dir(dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                paths.push(path);
            }
        }
        Ok(paths)
    }

    async fn read_seqs(dir: &Path) -> Result<Vec<(PathBuf, u64)>, StoreError> {
        let mut seqs = Vec::new();
        for path in Self::record_files(dir).await? {
            let Ok(content) = fs::read(&path).await else {
                continue;
            };
            if let Ok(stored) = serde_json::from_slice::<StoredSeq>(&content) {
                seqs.push((path, stored.seq));
            }
        }
        Ok(seqs)
    }

    /// Read every record in `dir` in sequence order, skipping files that
    /// fail to parse.
    async fn read_all<T: DeserializeOwned>(dir: &Path) -> Result<Vec<(u64, T)>, StoreError> {
        let mut records = Vec::new();
        for path in Self::record_files(dir).await? {
            match fs::read(&path).await {
                Ok(content) => match serde_json::from_slice::<Stored<T>>(&content) {
                    Ok(stored) => records.push((stored.seq, stored.record)),
                    Err(e) => warn!("Failed to deserialize record from {:?}: {}", path, e),
                },
                Err(e) => warn!("Failed to read record file {:?}: {}", path, e),
            }
        }
        records.sort_by_key(|(seq, _)| *seq);
        Ok(records)
    }
}

#[async_trait]
impl JobStore for FileJobStore {
    async fn save_job(&self, job: &Job) -> Result<(), StoreError> {
        let path = Self::record_path(&self.jobs_dir(), job.id.as_str());
        self.write_record(&path, job).await?;
        debug!("Saved job '{}' to {:?}", job.id, path);
        Ok(())
    }

    async fn job(&self, id: &JobId) -> Result<Option<Job>, StoreError> {
        Self::read_record(&Self::record_path(&self.jobs_dir(), id.as_str())).await
    }

    async fn jobs(&self) -> Result<Vec<Job>, StoreError> {
        let jobs: Vec<Job> = Self::read_all(&self.jobs_dir())
            .await?
            .into_iter()
            .map(|(_, job)| job)
            .collect();
        debug!("Loaded {} jobs from {:?}", jobs.len(), self.jobs_dir());
        Ok(jobs)
    }

    async fn save_job_run(&self, run: &JobRun) -> Result<(), StoreError> {
        let path = Self::record_path(&self.runs_dir(), run.id.as_str());
        self.write_record(&path, run).await?;
        debug!("Saved run '{}' ({}) for job '{}'", run.id, run.status, run.job_id);
        Ok(())
    }

    async fn job_run(&self, id: &RunId) -> Result<Option<JobRun>, StoreError> {
        Self::read_record(&Self::record_path(&self.runs_dir(), id.as_str())).await
    }

    async fn job_runs_for(&self, job_id: &JobId) -> Result<Vec<JobRun>, StoreError> {
        Ok(Self::read_all::<JobRun>(&self.runs_dir())
            .await?
            .into_iter()
            .map(|(_, run)| run)
            .filter(|run| &run.job_id == job_id)
            .collect())
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
