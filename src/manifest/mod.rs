mod registry;
mod slice;
mod snapshots;

pub use registry::{ConfigRegistry, NO_CHANGE, manifest_files};
pub use slice::{SliceDefinition, SliceRecord, StorageType};
pub use snapshots::{SnapshotList, snapshot_block};

/// Contiguous 100-block slices `0..100, 100..200, ...` all pinned to `version`.
#[cfg(test)]
pub(crate) fn sample_registry(slices: u64, version: &str) -> ConfigRegistry {
    let records = (0..slices)
        .map(|i| SliceRecord {
            start_block_id: i * 100,
            end_block_id: (i + 1) * 100,
            snapshot_path: format!("s3://snapshots/snapshot-{:010}.bin.zst", i * 100),
            storage_type: StorageType::S3,
            expected_integrity_hash: String::new(),
            target_version: version.to_string(),
        })
        .collect();
    ConfigRegistry::from_records("manifest.json", records).expect("sample manifest is valid")
}
