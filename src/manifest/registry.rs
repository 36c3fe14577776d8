use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Utc;
use tracing::{debug, info, warn};

use super::slice::{SliceDefinition, SliceRecord};
use crate::error::{ReplayError, Result};

/// Literal accepted by [`ConfigRegistry::set_target_version`] to leave versions untouched.
pub const NO_CHANGE: &str = "nochange";

/// Ordered set of slice definitions backed by a JSON manifest file.
///
/// Slice ids are manifest positions. Only the integrity hash and the target
/// version are ever rewritten; block ranges and snapshot locations are fixed
/// for the lifetime of the registry.
#[derive(Debug, Clone)]
pub struct ConfigRegistry {
    path: PathBuf,
    slices: Vec<SliceDefinition>,
}

impl ConfigRegistry {
    /// Loads and validates the manifest at `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            ReplayError::Config(format!("cannot read manifest {}: {e}", path.display()))
        })?;
        let records: Vec<SliceRecord> = serde_json::from_str(&contents).map_err(|e| {
            ReplayError::Config(format!("malformed manifest {}: {e}", path.display()))
        })?;
        let registry = Self::from_records(path, records)?;
        info!(
            manifest = %path.display(),
            slices = registry.len(),
            "Loaded replay manifest"
        );
        Ok(registry)
    }

    /// Builds a registry from already parsed records, assigning positions as slice ids.
    pub fn from_records(path: impl Into<PathBuf>, records: Vec<SliceRecord>) -> Result<Self> {
        let path = path.into();
        if records.is_empty() {
            warn!(manifest = %path.display(), "Manifest contains no slices");
        }

        let slices: Vec<SliceDefinition> = records
            .into_iter()
            .enumerate()
            .map(|(slice_id, record)| SliceDefinition::from_record(slice_id, record))
            .collect();
        validate(&slices)?;

        Ok(Self { path, slices })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.slices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slices.is_empty()
    }

    pub fn slices(&self) -> &[SliceDefinition] {
        &self.slices
    }

    pub fn get(&self, slice_id: usize) -> Option<&SliceDefinition> {
        self.slices.get(slice_id)
    }

    /// First slice, in position order, ending at `end_block` for `version`.
    pub fn find_by_end_block_and_version(
        &self,
        end_block: u64,
        version: &str,
    ) -> Option<&SliceDefinition> {
        self.slices
            .iter()
            .find(|s| s.end_block == end_block && s.target_version == version)
    }

    pub fn set_integrity_hash(&mut self, slice_id: usize, hash: impl Into<String>) -> Result<()> {
        let slice = self
            .slices
            .get_mut(slice_id)
            .ok_or_else(|| ReplayError::slice_not_found(slice_id))?;
        slice.expected_integrity_hash = hash.into();
        debug!(slice_id, hash = %slice.expected_integrity_hash, "Integrity hash set");
        Ok(())
    }

    /// Points every slice at `version`. Returns false when `version` is [`NO_CHANGE`].
    pub fn set_target_version(&mut self, version: &str) -> bool {
        let version = version.trim();
        if version.eq_ignore_ascii_case(NO_CHANGE) {
            return false;
        }
        for slice in &mut self.slices {
            slice.target_version = version.to_string();
        }
        info!(version, slices = self.slices.len(), "Target version rewritten");
        true
    }

    /// Writes the manifest back to its file through a temp file and a rename.
    pub fn persist(&self) -> Result<()> {
        let records: Vec<SliceRecord> = self.slices.iter().map(SliceDefinition::to_record).collect();
        let bytes = serde_json::to_vec_pretty(&records)?;
        write_atomic(&self.path, &bytes)?;
        info!(manifest = %self.path.display(), slices = records.len(), "Manifest persisted");
        Ok(())
    }
}

/// Candidate manifests in `dir`: `*.json` files whose name does not contain
/// `test-`, sorted by path.
pub fn manifest_files(dir: impl AsRef<Path>) -> Result<Vec<PathBuf>> {
    let dir = dir.as_ref();
    let entries = std::fs::read_dir(dir).map_err(|e| {
        ReplayError::Config(format!("cannot list manifests in {}: {e}", dir.display()))
    })?;

    let mut files = Vec::new();
    for entry in entries {
        let path = entry?.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if path.is_file() && name.ends_with(".json") && !name.contains("test-") {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

fn validate(slices: &[SliceDefinition]) -> Result<()> {
    for slice in slices {
        if slice.start_block >= slice.end_block {
            return Err(ReplayError::Config(format!(
                "slice {} has start block {} not below end block {}",
                slice.slice_id, slice.start_block, slice.end_block
            )));
        }
    }
    for pair in slices.windows(2) {
        let (prev, next) = (&pair[0], &pair[1]);
        if next.start_block < prev.start_block || next.end_block < prev.end_block {
            return Err(ReplayError::Config(format!(
                "slice {} ({}..{}) goes backwards from slice {} ({}..{})",
                next.slice_id,
                next.start_block,
                next.end_block,
                prev.slice_id,
                prev.start_block,
                prev.end_block
            )));
        }
    }
    Ok(())
}

fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let file_name = path
        .file_name()
        .and_then(|s| s.to_str())
        .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::InvalidInput, "bad filename"))?;
    let mut tmp = path.to_path_buf();
    tmp.set_file_name(format!(
        ".{file_name}.tmp.{}.{}",
        std::process::id(),
        Utc::now().timestamp_millis()
    ));

    let written = (|| {
        let mut f = std::fs::OpenOptions::new()
            .create_new(true)
            .write(true)
            .open(&tmp)?;
        f.write_all(bytes)?;
        f.sync_all()?;
        std::fs::rename(&tmp, path)
    })();
    if written.is_err() {
        let _ = std::fs::remove_file(&tmp);
    }
    written
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::StorageType;
    use std::fs;
    use tempfile::TempDir;

    const THREE_SLICES: &str = r#"[
        {"start_block_id": 0, "end_block_id": 100, "snapshot_path": "s3://snaps/a.bin.zst",
         "storage_type": "s3", "expected_integrity_hash": "", "leap_version": "1.0"},
        {"start_block_id": 100, "end_block_id": 200, "snapshot_path": "s3://snaps/b.bin.zst",
         "storage_type": "s3", "expected_integrity_hash": "", "leap_version": "1.0"},
        {"start_block_id": 200, "end_block_id": 300, "snapshot_path": "s3://snaps/c.bin.zst",
         "storage_type": "s3", "expected_integrity_hash": "", "leap_version": "1.0"}
    ]"#;

    fn write_manifest(dir: &TempDir, contents: &str) -> PathBuf {
        let path = dir.path().join("manifest.json");
        fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn load_assigns_positions() {
        let dir = TempDir::new().unwrap();
        let registry = ConfigRegistry::load(write_manifest(&dir, THREE_SLICES)).unwrap();

        assert_eq!(registry.len(), 3);
        for (i, slice) in registry.slices().iter().enumerate() {
            assert_eq!(slice.slice_id, i);
        }
        let second = registry.get(1).unwrap();
        assert_eq!(second.start_block, 100);
        assert_eq!(second.end_block, 200);
        assert_eq!(second.storage_type, StorageType::S3);
        assert!(registry.get(3).is_none());
    }

    #[test]
    fn find_requires_matching_version() {
        let dir = TempDir::new().unwrap();
        let registry = ConfigRegistry::load(write_manifest(&dir, THREE_SLICES)).unwrap();

        let slice = registry.find_by_end_block_and_version(200, "1.0").unwrap();
        assert_eq!(slice.slice_id, 1);
        assert!(registry.find_by_end_block_and_version(200, "2.0").is_none());
        assert!(registry.find_by_end_block_and_version(250, "1.0").is_none());
    }

    #[test]
    fn load_missing_file_is_config_error() {
        let dir = TempDir::new().unwrap();
        let err = ConfigRegistry::load(dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, ReplayError::Config(_)));
    }

    #[test]
    fn load_malformed_is_config_error() {
        let dir = TempDir::new().unwrap();
        let path = write_manifest(&dir, r#"{"not": "a list"}"#);
        assert!(matches!(
            ConfigRegistry::load(path).unwrap_err(),
            ReplayError::Config(_)
        ));

        let path = write_manifest(&dir, r#"[{"start_block_id": 0}]"#);
        assert!(matches!(
            ConfigRegistry::load(path).unwrap_err(),
            ReplayError::Config(_)
        ));
    }

    #[test]
    fn load_rejects_backwards_ranges() {
        let dir = TempDir::new().unwrap();
        let path = write_manifest(
            &dir,
            r#"[
            {"start_block_id": 100, "end_block_id": 200, "snapshot_path": "a", "storage_type": "s3", "target_version": "1.0"},
            {"start_block_id": 0, "end_block_id": 100, "snapshot_path": "b", "storage_type": "s3", "target_version": "1.0"}
        ]"#,
        );
        let err = ConfigRegistry::load(path).unwrap_err();
        assert!(matches!(err, ReplayError::Config(msg) if msg.contains("backwards")));
    }

    #[test]
    fn load_rejects_empty_range() {
        let dir = TempDir::new().unwrap();
        let path = write_manifest(
            &dir,
            r#"[{"start_block_id": 5, "end_block_id": 5, "snapshot_path": "a", "storage_type": "s3", "target_version": "1.0"}]"#,
        );
        assert!(matches!(
            ConfigRegistry::load(path).unwrap_err(),
            ReplayError::Config(_)
        ));
    }

    #[test]
    fn same_range_for_different_versions_is_allowed() {
        let dir = TempDir::new().unwrap();
        let path = write_manifest(
            &dir,
            r#"[
            {"start_block_id": 0, "end_block_id": 100, "snapshot_path": "a", "storage_type": "s3", "target_version": "1.0"},
            {"start_block_id": 0, "end_block_id": 100, "snapshot_path": "a", "storage_type": "s3", "target_version": "2.0"}
        ]"#,
        );
        let registry = ConfigRegistry::load(path).unwrap();
        assert_eq!(
            registry.find_by_end_block_and_version(100, "2.0").unwrap().slice_id,
            1
        );
    }

    #[test]
    fn empty_manifest_loads() {
        let dir = TempDir::new().unwrap();
        let registry = ConfigRegistry::load(write_manifest(&dir, "[]")).unwrap();
        assert!(registry.is_empty());
    }

    #[test]
    fn set_integrity_hash_and_persist() {
        let dir = TempDir::new().unwrap();
        let path = write_manifest(&dir, THREE_SLICES);
        let mut registry = ConfigRegistry::load(&path).unwrap();

        registry.set_integrity_hash(2, "abc123").unwrap();
        assert!(matches!(
            registry.set_integrity_hash(9, "x").unwrap_err(),
            ReplayError::NotFound(_)
        ));
        registry.persist().unwrap();

        let reloaded = ConfigRegistry::load(&path).unwrap();
        assert_eq!(reloaded.get(2).unwrap().expected_integrity_hash, "abc123");
        assert_eq!(reloaded.get(0).unwrap().expected_integrity_hash, "");
        assert_eq!(reloaded.get(1).unwrap().target_version, "1.0");

        let raw = fs::read_to_string(&path).unwrap();
        assert!(raw.contains("target_version"));
        assert!(!raw.contains("leap_version"));
    }

    #[test]
    fn persist_leaves_no_temp_files() {
        let dir = TempDir::new().unwrap();
        let path = write_manifest(&dir, THREE_SLICES);
        let registry = ConfigRegistry::load(&path).unwrap();
        registry.persist().unwrap();
        registry.persist().unwrap();

        let entries: Vec<_> = fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn set_target_version_respects_nochange() {
        let dir = TempDir::new().unwrap();
        let mut registry = ConfigRegistry::load(write_manifest(&dir, THREE_SLICES)).unwrap();

        assert!(!registry.set_target_version("NoChange"));
        assert_eq!(registry.get(0).unwrap().target_version, "1.0");

        assert!(registry.set_target_version(" 1.1.0 "));
        assert!(registry.slices().iter().all(|s| s.target_version == "1.1.0"));
    }

    #[test]
    fn manifest_files_skip_tests_and_other_files() {
        let dir = TempDir::new().unwrap();
        for name in ["b.json", "a.json", "test-small.json", "notes.txt", ".a.json.tmp.1.2"] {
            fs::write(dir.path().join(name), "[]").unwrap();
        }
        fs::create_dir(dir.path().join("nested.json")).unwrap();

        let files = manifest_files(dir.path()).unwrap();
        assert_eq!(files, vec![dir.path().join("a.json"), dir.path().join("b.json")]);
    }

    #[test]
    fn manifest_files_missing_dir_is_config_error() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            manifest_files(dir.path().join("absent")),
            Err(ReplayError::Config(_))
        ));
    }
}
