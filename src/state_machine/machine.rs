use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use super::job::{Job, JobPatch, JobStatus};
use super::state::{StateMachine, Transition};
use super::tag::VersionTag;
use crate::error::{ReplayError, Result};
use crate::manifest::ConfigRegistry;
use crate::summary::RunSummary;

/// A job snapshot paired with the tag a worker must echo back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaggedJob {
    pub job: Job,
    pub tag: VersionTag,
}

impl TaggedJob {
    fn of(job: &Job) -> Self {
        Self {
            tag: VersionTag::of(job),
            job: job.clone(),
        }
    }
}

#[derive(Debug)]
struct Generation {
    id: Uuid,
    jobs: Vec<Job>,
}

impl Generation {
    fn build(registry: &ConfigRegistry) -> Self {
        let id = Uuid::new_v4();
        let jobs = registry
            .slices()
            .iter()
            .map(|slice| Job::from_slice(id, slice))
            .collect();
        Self { id, jobs }
    }

    fn running(&self) -> usize {
        self.jobs
            .iter()
            .filter(|j| j.status == JobStatus::Running)
            .count()
    }
}

/// In-memory job registry for one manifest generation.
///
/// Every operation runs under a single lock, so claims, conditional updates
/// and resets are linearizable with respect to each other.
#[derive(Debug)]
pub struct JobStateMachine {
    inner: Mutex<Generation>,
}

impl JobStateMachine {
    pub fn new(registry: &ConfigRegistry) -> Self {
        let generation = Generation::build(registry);
        info!(generation = %generation.id, jobs = generation.jobs.len(), "Job generation created");
        Self {
            inner: Mutex::new(generation),
        }
    }

    // No critical section can panic halfway through a mutation, so a poisoned
    // lock still guards consistent data.
    fn lock(&self) -> MutexGuard<'_, Generation> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn generation(&self) -> Uuid {
        self.lock().id
    }

    pub fn len(&self) -> usize {
        self.lock().jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().jobs.is_empty()
    }

    /// Claims the first waiting job in position order.
    ///
    /// Returns `None` when every job has already been handed out.
    pub fn next_job(&self) -> Option<TaggedJob> {
        let mut generation = self.lock();
        let now = Utc::now();
        let job = generation.jobs.iter_mut().find(|j| j.is_waiting())?;
        StateMachine::claim(job, now)?;
        info!(
            job_id = job.job_id,
            start_block = job.start_block_num,
            end_block = job.end_block_num,
            version = %job.target_version,
            "Job claimed"
        );
        Some(TaggedJob::of(job))
    }

    pub fn get(&self, job_id: usize) -> Option<Job> {
        self.lock().jobs.get(job_id).cloned()
    }

    /// Snapshot and its tag, taken under the same lock.
    pub fn get_tagged(&self, job_id: usize) -> Option<TaggedJob> {
        self.lock().jobs.get(job_id).map(TaggedJob::of)
    }

    pub fn compute_tag(&self, job_id: usize) -> Result<VersionTag> {
        self.lock()
            .jobs
            .get(job_id)
            .map(VersionTag::of)
            .ok_or_else(|| ReplayError::job_not_found(job_id))
    }

    /// Every job, in position order.
    pub fn all(&self) -> Vec<Job> {
        self.lock().jobs.clone()
    }

    /// Applies `patch` only if `supplied` still matches the job's current tag.
    pub fn update(&self, job_id: usize, supplied: &VersionTag, patch: &JobPatch) -> Result<TaggedJob> {
        let mut generation = self.lock();
        let job = generation
            .jobs
            .get_mut(job_id)
            .ok_or_else(|| ReplayError::job_not_found(job_id))?;

        let current = VersionTag::of(job);
        if &current != supplied {
            warn!(job_id, supplied = %supplied, current = %current, "Rejected update with stale tag");
            return Err(ReplayError::ConcurrencyConflict { job_id });
        }

        let transition = StateMachine::apply(job, patch, Utc::now())?;
        match transition {
            Transition::Completed => info!(
                job_id,
                start_time = ?job.start_time,
                end_time = ?job.end_time,
                last_block = job.last_block_processed,
                snapshot = %job.snapshot_path,
                "Job completed"
            ),
            _ => info!(job_id, last_block = job.last_block_processed, "Job progressed"),
        }
        Ok(TaggedJob::of(job))
    }

    /// Replaces the whole generation with fresh jobs built from `registry`.
    ///
    /// Fails with `Busy` while any job is running unless `force` is set.
    pub fn reset(&self, registry: &ConfigRegistry, force: bool) -> Result<Uuid> {
        let mut generation = self.lock();
        let running = generation.running();
        if running > 0 && !force {
            return Err(ReplayError::Busy { running });
        }
        if running > 0 {
            warn!(running, generation = %generation.id, "Forced reset discards running jobs");
        }

        let previous = generation.id;
        *generation = Generation::build(registry);
        info!(
            previous = %previous,
            generation = %generation.id,
            jobs = generation.jobs.len(),
            manifest = %registry.path().display(),
            "Job generation reset"
        );
        Ok(generation.id)
    }

    pub fn summary(&self) -> RunSummary {
        let generation = self.lock();
        RunSummary::from_jobs(generation.id, &generation.jobs)
    }
}
