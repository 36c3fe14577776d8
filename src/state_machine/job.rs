use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{ReplayError, Result};
use crate::manifest::{SliceDefinition, StorageType};

/// Tracks the lifecycle status of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JobStatus {
    #[serde(rename = "WAITING_4_WORKER")]
    Waiting4Worker,
    #[serde(rename = "RUNNING")]
    Running,
    #[serde(rename = "COMPLETE")]
    Complete,
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(match self {
            JobStatus::Waiting4Worker => "WAITING_4_WORKER",
            JobStatus::Running => "RUNNING",
            JobStatus::Complete => "COMPLETE",
        })
    }
}

impl FromStr for JobStatus {
    type Err = ReplayError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "WAITING_4_WORKER" => Ok(JobStatus::Waiting4Worker),
            "RUNNING" => Ok(JobStatus::Running),
            "COMPLETE" => Ok(JobStatus::Complete),
            other => Err(ReplayError::InvalidPatch(format!("unknown status {other:?}"))),
        }
    }
}

/// Runtime instance of one manifest slice.
///
/// `job_id` is the slice position. `revision` is bumped on every mutation so
/// that two successive snapshots never share a tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    pub job_id: usize,
    pub replay_slice_id: usize,
    pub generation: Uuid,
    pub status: JobStatus,
    pub start_block_num: u64,
    pub end_block_num: u64,
    pub last_block_processed: u64,
    pub snapshot_path: String,
    pub storage_type: StorageType,
    pub target_version: String,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub revision: u64,
}

impl Job {
    pub fn from_slice(generation: Uuid, slice: &SliceDefinition) -> Self {
        Self {
            job_id: slice.slice_id,
            replay_slice_id: slice.slice_id,
            generation,
            status: JobStatus::Waiting4Worker,
            start_block_num: slice.start_block,
            end_block_num: slice.end_block,
            last_block_processed: slice.start_block,
            snapshot_path: slice.snapshot_path.clone(),
            storage_type: slice.storage_type,
            target_version: slice.target_version.clone(),
            start_time: None,
            end_time: None,
            revision: 0,
        }
    }

    pub fn is_waiting(&self) -> bool {
        self.status == JobStatus::Waiting4Worker
    }

    pub fn contains_block(&self, block: u64) -> bool {
        (self.start_block_num..=self.end_block_num).contains(&block)
    }
}

/// Fields a worker may change on a running job. Anything else in the
/// payload is rejected.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JobPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<JobStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_block_processed: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
}

impl JobPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update_status(mut self, status: JobStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn update_last_block(mut self, block: u64) -> Self {
        self.last_block_processed = Some(block);
        self
    }

    pub fn update_start_time(mut self, at: DateTime<Utc>) -> Self {
        self.start_time = Some(at);
        self
    }

    pub fn update_end_time(mut self, at: DateTime<Utc>) -> Self {
        self.end_time = Some(at);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.status.is_none()
            && self.last_block_processed.is_none()
            && self.start_time.is_none()
            && self.end_time.is_none()
    }

    /// Parses a worker payload; unknown fields or status values are an `InvalidPatch`.
    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes).map_err(|e| ReplayError::InvalidPatch(e.to_string()))
    }
}
