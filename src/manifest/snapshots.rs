use std::path::PathBuf;

use tracing::debug;

use super::registry::ConfigRegistry;
use super::slice::{SliceRecord, StorageType};
use crate::error::{ReplayError, Result};

/// Block number encoded in a snapshot file name of the form
/// `snapshot-YYYY-MM-DD-HH-<chain>-v<N>-<block>.bin.zst`.
pub fn snapshot_block(name: &str) -> Result<u64> {
    let malformed = |why: &str| ReplayError::Config(format!("snapshot name {name:?}: {why}"));

    let parts: Vec<&str> = name.split('-').collect();
    if parts.len() != 8 || parts[0] != "snapshot" {
        return Err(malformed("expected snapshot-YYYY-MM-DD-HH-<chain>-v<N>-<block>.bin.zst"));
    }
    if parts[1..5].iter().any(|p| p.is_empty() || !p.bytes().all(|b| b.is_ascii_digit())) {
        return Err(malformed("date fields must be numeric"));
    }
    let format_ok = parts[6]
        .strip_prefix('v')
        .is_some_and(|v| !v.is_empty() && v.bytes().all(|b| b.is_ascii_digit()));
    if !format_ok {
        return Err(malformed("missing v<N> snapshot format"));
    }
    let block = parts[7]
        .split_once('.')
        .map(|(block, _)| block)
        .ok_or_else(|| malformed("missing file extension"))?;
    block.parse().map_err(|_| malformed("block number is not numeric"))
}

/// Settings for [`records_from_snapshot_list`].
#[derive(Debug, Clone)]
pub struct SnapshotList {
    /// Location prepended to each snapshot name, e.g. `s3://bucket/snapshots/`.
    pub prefix: String,
    pub storage_type: StorageType,
    pub target_version: String,
}

impl SnapshotList {
    /// Builds one slice per consecutive pair of snapshots.
    ///
    /// The first name only opens the first slice. Every slice starts from the
    /// snapshot taken at its start block and ends at the block of the next
    /// snapshot. Blank lines are ignored.
    pub fn records<'a>(&self, names: impl IntoIterator<Item = &'a str>) -> Result<Vec<SliceRecord>> {
        let mut names = names.into_iter().map(str::trim).filter(|n| !n.is_empty());
        let Some(first) = names.next() else {
            return Ok(Vec::new());
        };

        let mut start_name = first;
        let mut start_block = snapshot_block(first)?;
        let mut records = Vec::new();
        for name in names {
            let end_block = snapshot_block(name)?;
            debug!(start_block, end_block, snapshot = start_name, "Slice from snapshot pair");
            records.push(SliceRecord {
                start_block_id: start_block,
                end_block_id: end_block,
                snapshot_path: format!("{}{start_name}", self.prefix),
                storage_type: self.storage_type,
                expected_integrity_hash: String::new(),
                target_version: self.target_version.clone(),
            });
            start_name = name;
            start_block = end_block;
        }
        Ok(records)
    }

    /// Builds and validates a registry that will persist to `output`.
    pub fn registry<'a>(
        &self,
        output: impl Into<PathBuf>,
        names: impl IntoIterator<Item = &'a str>,
    ) -> Result<ConfigRegistry> {
        ConfigRegistry::from_records(output, self.records(names)?)
    }
}
