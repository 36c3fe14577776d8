use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{ReplayError, Result};
use crate::hosts::HostPool;
use crate::manifest::{ConfigRegistry, SliceDefinition};
use crate::state_machine::JobStateMachine;

/// Owns the manifest, the live job generation and the host pool.
///
/// Built once at start-up and shared behind an `Arc`. Lock order is
/// registry, then jobs, then hosts.
#[derive(Debug)]
pub struct ReplayOrchestrator {
    registry: RwLock<ConfigRegistry>,
    jobs: JobStateMachine,
    hosts: Mutex<HostPool>,
}

impl ReplayOrchestrator {
    pub fn new(registry: ConfigRegistry) -> Self {
        let jobs = JobStateMachine::new(&registry);
        Self {
            registry: RwLock::new(registry),
            jobs,
            hosts: Mutex::new(HostPool::new()),
        }
    }

    pub fn from_manifest(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self::new(ConfigRegistry::load(path)?))
    }

    fn registry(&self) -> RwLockReadGuard<'_, ConfigRegistry> {
        self.registry.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn registry_mut(&self) -> RwLockWriteGuard<'_, ConfigRegistry> {
        self.registry.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn hosts(&self) -> MutexGuard<'_, HostPool> {
        self.hosts.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn jobs(&self) -> &JobStateMachine {
        &self.jobs
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.registry().path().to_path_buf()
    }

    pub fn slice(&self, slice_id: usize) -> Option<SliceDefinition> {
        self.registry().get(slice_id).cloned()
    }

    pub fn slices(&self) -> Vec<SliceDefinition> {
        self.registry().slices().to_vec()
    }

    /// Stores a worker-computed integrity hash on the matching slice and
    /// persists the manifest. Returns the slice id.
    pub fn record_integrity_hash(&self, end_block: u64, version: &str, hash: &str) -> Result<usize> {
        let mut registry = self.registry_mut();
        let (slice_id, previous) = registry
            .find_by_end_block_and_version(end_block, version)
            .map(|s| (s.slice_id, s.expected_integrity_hash.clone()))
            .ok_or_else(|| {
                ReplayError::NotFound(format!(
                    "slice ending at block {end_block} for version {version}"
                ))
            })?;

        registry.set_integrity_hash(slice_id, hash)?;
        if let Err(e) = registry.persist() {
            registry.set_integrity_hash(slice_id, previous)?;
            return Err(e);
        }
        info!(slice_id, end_block, version, hash, "Integrity hash recorded");
        Ok(slice_id)
    }

    /// Loads the manifest at `path` and starts a new job generation from it.
    ///
    /// A manifest that fails to load leaves the registry and the current
    /// generation untouched.
    pub fn reset_from_path(&self, path: impl AsRef<Path>, force: bool) -> Result<Uuid> {
        let registry = ConfigRegistry::load(path)?;
        self.reset(registry, force)
    }

    pub fn reset(&self, registry: ConfigRegistry, force: bool) -> Result<Uuid> {
        let mut current = self.registry_mut();
        let generation = self.jobs.reset(&registry, force)?;
        *current = registry;
        Ok(generation)
    }

    /// Records `count` freshly provisioned hosts. Refused while jobs are running.
    pub fn provision_hosts(&self, count: u32) -> Result<u32> {
        let summary = self.jobs.summary();
        let mut hosts = self.hosts();
        if summary.is_running {
            warn!(running = summary.running, "Refusing to provision hosts while jobs run");
            return Err(ReplayError::Busy {
                running: summary.running,
            });
        }
        hosts.allocate(count);
        Ok(hosts.count())
    }

    /// Records that every host has been torn down. Refused when none are allocated.
    pub fn teardown_hosts(&self) -> Result<()> {
        let mut hosts = self.hosts();
        if !hosts.has_hosts() {
            return Err(ReplayError::NoHosts);
        }
        hosts.release();
        Ok(())
    }

    pub fn host_count(&self) -> u32 {
        self.hosts().count()
    }
}
