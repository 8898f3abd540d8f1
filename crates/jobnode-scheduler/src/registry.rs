//! Active job registry and due-time queue.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, HashSet, VecDeque};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use jobnode_core::{CronError, CronSpec, Job, JobId, Schedule, Trigger};

/// A job that is due, with the trigger that made it due.
#[derive(Debug, Clone)]
pub struct Fire {
    pub job: Arc<Job>,
    pub trigger: Trigger,
}

struct Entry {
    job: Arc<Job>,
    cron: Option<CronSpec>,
    next_cron: Option<DateTime<Utc>>,
    /// Unfired one-off instants inside the schedule bounds, ascending.
    pending_run_at: VecDeque<DateTime<Utc>>,
    generation: u64,
}

impl Entry {
    fn next_due(&self) -> Option<DateTime<Utc>> {
        match (self.next_cron, self.pending_run_at.front().copied()) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }
}

/// Heap slot. Stale once the entry's generation has moved on.
#[derive(Debug)]
struct Due {
    at: DateTime<Utc>,
    job_id: JobId,
    generation: u64,
}

impl PartialEq for Due {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Due {}

impl PartialOrd for Due {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Due {
    fn cmp(&self, other: &Self) -> Ordering {
        // Earliest instant first, then lowest job id (reversed for the max-heap)
        other
            .at
            .cmp(&self.at)
            .then_with(|| other.job_id.cmp(&self.job_id))
            .then_with(|| other.generation.cmp(&self.generation))
    }
}

/// First cron instant strictly after `after` that lies within the bounds.
fn next_cron_instant(
    cron: &CronSpec,
    schedule: &Schedule,
    after: DateTime<Utc>,
) -> Option<DateTime<Utc>> {
    let start = schedule.start_at;
    let cursor = match start {
        Some(start) if start > after => start - Duration::seconds(1),
        _ => after,
    };

    let mut next = cron.next_after(cursor)?;
    while next <= after || start.is_some_and(|start| next < start) {
        next = cron.next_after(next)?;
    }

    if schedule.end_at.is_some_and(|end| next > end) {
        return None;
    }
    Some(next)
}

/// Registry of scheduled jobs plus a min-heap of their next due instants.
///
/// Each job has at most one live heap slot. Replacing or advancing a job
/// bumps its generation; slots from older generations are dropped when
/// they surface.
#[derive(Default)]
pub struct JobRegistry {
    entries: HashMap<JobId, Entry>,
    heap: BinaryHeap<Due>,
    generations: u64,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) a job and return its next due instant.
    ///
    /// `fired` lists one-off instants that already produced a run. A
    /// one-off instant earlier than `now` is dropped unless `catch_up` is
    /// set, in which case it is due immediately.
    pub fn insert(
        &mut self,
        job: Arc<Job>,
        fired: &HashSet<DateTime<Utc>>,
        now: DateTime<Utc>,
        catch_up: bool,
    ) -> Result<Option<DateTime<Utc>>, CronError> {
        let cron = job.cron_spec().transpose()?;
        let next_cron = cron
            .as_ref()
            .and_then(|cron| next_cron_instant(cron, &job.schedule, now));

        let mut run_at: Vec<DateTime<Utc>> = job
            .schedule
            .run_at
            .iter()
            .copied()
            .filter(|at| job.schedule.within_bounds(*at))
            .filter(|at| !fired.contains(at))
            .filter(|at| catch_up || *at >= now)
            .collect();
        run_at.sort();
        run_at.dedup();

        let entry = Entry {
            job: job.clone(),
            cron,
            next_cron,
            pending_run_at: run_at.into(),
            generation: 0,
        };
        self.entries.insert(job.id.clone(), entry);
        Ok(self.reschedule(&job.id))
    }

    /// Give `id` a fresh heap slot for its current next due instant.
    fn reschedule(&mut self, id: &JobId) -> Option<DateTime<Utc>> {
        self.generations += 1;
        let generation = self.generations;
        let entry = self.entries.get_mut(id)?;
        entry.generation = generation;
        let at = entry.next_due()?;
        self.heap.push(Due {
            at,
            job_id: id.clone(),
            generation,
        });
        Some(at)
    }

    fn is_live(&self, due: &Due) -> bool {
        self.entries
            .get(&due.job_id)
            .is_some_and(|entry| entry.generation == due.generation)
    }

    pub fn contains(&self, id: &JobId) -> bool {
        self.entries.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Next due instant of a registered job.
    pub fn next_due(&self, id: &JobId) -> Option<DateTime<Utc>> {
        self.entries.get(id).and_then(Entry::next_due)
    }

    /// Registered but with nothing left to fire.
    pub fn is_dormant(&self, id: &JobId) -> bool {
        self.entries
            .get(id)
            .is_some_and(|entry| entry.next_due().is_none())
    }

    /// Earliest due instant across all jobs, dropping stale heap slots.
    pub fn earliest(&mut self) -> Option<DateTime<Utc>> {
        while let Some(top) = self.heap.peek() {
            if self.is_live(top) {
                return Some(top.at);
            }
            self.heap.pop();
        }
        None
    }

    /// Pop every entry due at or before `now`, in (instant, job id) order,
    /// and advance each job past it.
    ///
    /// A cron recurrence and a one-off instant that coincide produce a
    /// single fire, recorded as the one-off trigger.
    pub fn pop_due(&mut self, now: DateTime<Utc>) -> Vec<Fire> {
        let mut fires = Vec::new();

        while let Some(at) = self.earliest() {
            if at > now {
                break;
            }
            let Some(due) = self.heap.pop() else { break };
            let Some(entry) = self.entries.get_mut(&due.job_id) else {
                continue;
            };

            let mut trigger = None;
            if entry.next_cron == Some(at) {
                entry.next_cron = entry
                    .cron
                    .as_ref()
                    .and_then(|cron| next_cron_instant(cron, &entry.job.schedule, now.max(at)));
                trigger = Some(Trigger::Cron { at });
            }
            if entry.pending_run_at.front() == Some(&at) {
                entry.pending_run_at.pop_front();
                trigger = Some(Trigger::RunAt { at });
            }

            if let Some(trigger) = trigger {
                fires.push(Fire {
                    job: entry.job.clone(),
                    trigger,
                });
            }
            self.reschedule(&due.job_id);
        }

        fires
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
