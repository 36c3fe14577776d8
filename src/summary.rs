use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::state_machine::{Job, JobStatus};

/// Aggregate view over one job generation. Recomputed on every call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub generation: Uuid,
    pub total: usize,
    pub waiting: usize,
    pub running: usize,
    pub complete: usize,
    /// Lowest `last_block_processed` among jobs that have been claimed.
    pub min_block_processed: Option<u64>,
    /// Highest `last_block_processed` among jobs that have been claimed.
    pub max_block_processed: Option<u64>,
    pub is_running: bool,
    pub is_complete: bool,
}

impl RunSummary {
    pub fn from_jobs(generation: Uuid, jobs: &[Job]) -> Self {
        let count = |status: JobStatus| jobs.iter().filter(|j| j.status == status).count();
        let waiting = count(JobStatus::Waiting4Worker);
        let running = count(JobStatus::Running);
        let complete = count(JobStatus::Complete);

        let claimed = jobs.iter().filter(|j| !j.is_waiting()).map(|j| j.last_block_processed);
        let min_block_processed = claimed.clone().min();
        let max_block_processed = claimed.max();

        Self {
            generation,
            total: jobs.len(),
            waiting,
            running,
            complete,
            min_block_processed,
            max_block_processed,
            is_running: running > 0,
            is_complete: !jobs.is_empty() && complete == jobs.len(),
        }
    }

    pub fn count(&self, status: JobStatus) -> usize {
        match status {
            JobStatus::Waiting4Worker => self.waiting,
            JobStatus::Running => self.running,
            JobStatus::Complete => self.complete,
        }
    }

    /// Completed share of the generation, 0.0 to 1.0.
    pub fn completion_ratio(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.complete as f64 / self.total as f64
    }
}
