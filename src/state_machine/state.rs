use chrono::{DateTime, Utc};

use super::job::{Job, JobPatch, JobStatus};
use crate::error::{ReplayError, Result};

/// The result of applying an event to a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// WAITING_4_WORKER → RUNNING, handed to a worker.
    Claimed,
    /// RUNNING → RUNNING with new progress fields.
    Progressed,
    /// RUNNING → COMPLETE.
    Completed,
}

/// Applies transitions to a single `Job`.
///
/// ```text
/// WAITING_4_WORKER --claim--> RUNNING --update--> RUNNING
///                                     --update(COMPLETE)--> COMPLETE
/// ```
///
/// Nothing leaves `COMPLETE`; only a reset builds fresh jobs.
pub struct StateMachine;

impl StateMachine {
    /// Claims a waiting job. Returns `None` and leaves the job untouched otherwise.
    pub fn claim(job: &mut Job, now: DateTime<Utc>) -> Option<Transition> {
        if !job.is_waiting() {
            return None;
        }
        job.status = JobStatus::Running;
        job.start_time = Some(now);
        job.end_time = None;
        job.revision += 1;
        Some(Transition::Claimed)
    }

    /// Validates `patch` against the job and applies it. On error the job is unchanged.
    pub fn apply(job: &mut Job, patch: &JobPatch, now: DateTime<Utc>) -> Result<Transition> {
        if patch.is_empty() {
            return Err(ReplayError::InvalidPatch(
                "no field to be updated".to_string(),
            ));
        }
        if job.status != JobStatus::Running {
            return Err(ReplayError::InvalidPatch(format!(
                "job {} is {}, only RUNNING jobs accept updates",
                job.job_id, job.status
            )));
        }

        let target = patch.status.unwrap_or(job.status);
        let transition = match target {
            JobStatus::Running => Transition::Progressed,
            JobStatus::Complete => Transition::Completed,
            JobStatus::Waiting4Worker => {
                return Err(ReplayError::InvalidPatch(
                    "a running job cannot return to WAITING_4_WORKER".to_string(),
                ));
            }
        };

        if let Some(block) = patch.last_block_processed
            && !job.contains_block(block)
        {
            return Err(ReplayError::InvalidPatch(format!(
                "last_block_processed {block} outside {}..={}",
                job.start_block_num, job.end_block_num
            )));
        }

        let start_time = patch.start_time.or(job.start_time);
        let end_time = match (patch.end_time, transition) {
            (Some(at), _) => Some(at),
            (None, Transition::Completed) => Some(now),
            (None, _) => job.end_time,
        };
        if let (Some(start), Some(end)) = (start_time, end_time)
            && end < start
        {
            return Err(ReplayError::InvalidPatch(format!(
                "end_time {end} precedes start_time {start}"
            )));
        }

        job.status = target;
        if let Some(block) = patch.last_block_processed {
            job.last_block_processed = block;
        }
        job.start_time = start_time;
        job.end_time = end_time;
        job.revision += 1;

        Ok(transition)
    }
}
