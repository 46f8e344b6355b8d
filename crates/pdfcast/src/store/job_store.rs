//! In-process job record store with per-record locking.

use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};

use crate::error::StoreError;
use crate::job::{ArtifactRef, Job, JobId, JobMutation, JobStatus};

// ─── Helpers ────────────────────────────────────────────────────────────────

fn read_lock<'a, T>(lock: &'a RwLock<T>, what: &str) -> RwLockReadGuard<'a, T> {
    match lock.read() {
        Ok(guard) => guard,
        Err(poisoned) => {
            log::warn!("Job store {} lock was poisoned, recovering", what);
            poisoned.into_inner()
        }
    }
}

fn write_lock<'a, T>(lock: &'a RwLock<T>, what: &str) -> RwLockWriteGuard<'a, T> {
    match lock.write() {
        Ok(guard) => guard,
        Err(poisoned) => {
            log::warn!("Job store {} lock was poisoned, recovering", what);
            poisoned.into_inner()
        }
    }
}

// ─── Slot ───────────────────────────────────────────────────────────────────

/// One record. Writers hold the lock while applying a mutation to a private
/// copy; readers hold it only long enough to clone the `Arc`.
struct Slot {
    job: RwLock<Arc<Job>>,
}

impl Slot {
    fn new(job: Job) -> Self {
        Self {
            job: RwLock::new(Arc::new(job)),
        }
    }

    fn snapshot(&self) -> Arc<Job> {
        Arc::clone(&read_lock(&self.job, "record"))
    }
}

// ─── Counts ─────────────────────────────────────────────────────────────────

/// Number of jobs per status.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct JobCounts {
    pub pending: usize,
    pub running: usize,
    pub completed: usize,
    pub failed: usize,
}

// ─── JobStore ───────────────────────────────────────────────────────────────

/// Holds the lifecycle state of every submitted job.
///
/// The outer map lock is only taken for lookups (shared) and for inserting or
/// removing records (exclusive). Updates lock the single record they touch,
/// so unrelated jobs are written concurrently.
pub struct JobStore {
    records: RwLock<HashMap<JobId, Arc<Slot>>>,
}

impl JobStore {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
        }
    }

    fn slot(&self, job_id: &JobId) -> Option<Arc<Slot>> {
        read_lock(&self.records, "map").get(job_id).cloned()
    }

    /// Registers a new pending job for an uploaded document.
    pub fn create(&self, job_id: JobId, initial: ArtifactRef) -> Result<Job, StoreError> {
        self.insert(Job::new(job_id, initial))
    }

    /// Registers a fully built job record. Identifiers must be unused.
    pub fn insert(&self, job: Job) -> Result<Job, StoreError> {
        let mut records = write_lock(&self.records, "map");
        if records.contains_key(&job.id) {
            return Err(StoreError::DuplicateJob(job.id));
        }
        records.insert(job.id.clone(), Arc::new(Slot::new(job.clone())));
        log::debug!("Created job {}", job.id);
        Ok(job)
    }

    /// Applies a stage-transition mutation atomically and returns the new
    /// snapshot. Only the orchestrator calls this; an unknown identifier or
    /// a forbidden transition is an orchestration bug.
    pub fn update(&self, job_id: &JobId, mutation: JobMutation) -> Result<Arc<Job>, StoreError> {
        let slot = self
            .slot(job_id)
            .ok_or_else(|| StoreError::InternalInconsistency {
                job_id: job_id.clone(),
                reason: "update on a job that was never created".to_string(),
            })?;

        let mut current = write_lock(&slot.job, "record");
        let mut next = Job::clone(&current);
        next.apply(mutation)
            .map_err(|reason| StoreError::InternalInconsistency {
                job_id: job_id.clone(),
                reason,
            })?;

        let next = Arc::new(next);
        *current = Arc::clone(&next);
        Ok(next)
    }

    /// Returns a consistent snapshot of a job, or `None` if unknown.
    pub fn get(&self, job_id: &JobId) -> Option<Arc<Job>> {
        self.slot(job_id).map(|slot| slot.snapshot())
    }

    pub fn contains(&self, job_id: &JobId) -> bool {
        read_lock(&self.records, "map").contains_key(job_id)
    }

    /// Returns all jobs sorted by creation time (newest first).
    pub fn get_all(&self) -> Vec<Arc<Job>> {
        let slots: Vec<Arc<Slot>> = read_lock(&self.records, "map").values().cloned().collect();
        let mut jobs: Vec<Arc<Job>> = slots.iter().map(|slot| slot.snapshot()).collect();
        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        jobs
    }

    pub fn counts(&self) -> JobCounts {
        let mut counts = JobCounts::default();
        for job in self.get_all() {
            match job.status {
                JobStatus::Pending => counts.pending += 1,
                JobStatus::Running => counts.running += 1,
                JobStatus::Completed => counts.completed += 1,
                JobStatus::Failed => counts.failed += 1,
            }
        }
        counts
    }

    pub fn len(&self) -> usize {
        read_lock(&self.records, "map").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Removes finished jobs last updated before `cutoff` and returns them so
    /// their artifacts can be cleaned up. Jobs still in flight are kept.
    pub fn purge_finished_before(&self, cutoff: DateTime<Utc>) -> Vec<Arc<Job>> {
        let mut records = write_lock(&self.records, "map");
        let expired: Vec<JobId> = records
            .iter()
            .filter_map(|(id, slot)| {
                let job = slot.snapshot();
                (job.is_finished() && job.updated_at < cutoff).then(|| id.clone())
            })
            .collect();

        let removed: Vec<Arc<Job>> = expired
            .iter()
            .filter_map(|id| records.remove(id))
            .map(|slot| slot.snapshot())
            .collect();

        if !removed.is_empty() {
            log::info!("Purged {} finished jobs from the store", removed.len());
        }
        removed
    }
}

impl Default for JobStore {
    fn default() -> Self {
        Self::new()
    }
}
