use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ReplayError;

/// Storage backend holding a slice's starting snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageType {
    S3,
    #[serde(alias = "local")]
    Fs,
}

impl fmt::Display for StorageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageType::S3 => write!(f, "s3"),
            StorageType::Fs => write!(f, "fs"),
        }
    }
}

impl FromStr for StorageType {
    type Err = ReplayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "s3" => Ok(StorageType::S3),
            "fs" | "local" => Ok(StorageType::Fs),
            other => Err(ReplayError::Config(format!("unknown storage type {other:?}"))),
        }
    }
}

/// One record of the on-disk manifest.
///
/// The version field has been written as `leap_version` and `spring_version`
/// by older tooling; both are accepted on read, `target_version` is written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SliceRecord {
    pub start_block_id: u64,
    pub end_block_id: u64,
    pub snapshot_path: String,
    pub storage_type: StorageType,
    #[serde(default)]
    pub expected_integrity_hash: String,
    #[serde(alias = "leap_version", alias = "spring_version")]
    pub target_version: String,
}

/// A contiguous block range to replay, positioned within its manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SliceDefinition {
    pub slice_id: usize,
    pub start_block: u64,
    pub end_block: u64,
    pub snapshot_path: String,
    pub storage_type: StorageType,
    pub target_version: String,
    pub expected_integrity_hash: String,
}

impl SliceDefinition {
    pub fn from_record(slice_id: usize, record: SliceRecord) -> Self {
        Self {
            slice_id,
            start_block: record.start_block_id,
            end_block: record.end_block_id,
            snapshot_path: record.snapshot_path,
            storage_type: record.storage_type,
            target_version: record.target_version,
            expected_integrity_hash: record.expected_integrity_hash,
        }
    }

    pub fn to_record(&self) -> SliceRecord {
        SliceRecord {
            start_block_id: self.start_block,
            end_block_id: self.end_block,
            snapshot_path: self.snapshot_path.clone(),
            storage_type: self.storage_type,
            expected_integrity_hash: self.expected_integrity_hash.clone(),
            target_version: self.target_version.clone(),
        }
    }

    /// Number of blocks covered by the slice.
    pub fn block_span(&self) -> u64 {
        self.end_block - self.start_block
    }
}
