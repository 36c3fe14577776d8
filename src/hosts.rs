use tracing::info;

/// Count of worker hosts currently provisioned for the fleet.
///
/// Provisioning itself happens outside the coordinator; the pool only
/// records what the caller reports.
#[derive(Debug, Default)]
pub struct HostPool {
    host_count: u32,
}

impl HostPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allocate(&mut self, count: u32) {
        info!(previous = self.host_count, count, "Hosts allocated");
        self.host_count = count;
    }

    pub fn release(&mut self) {
        if self.host_count > 0 {
            info!(count = self.host_count, "Hosts released");
        }
        self.host_count = 0;
    }

    pub fn has_hosts(&self) -> bool {
        self.host_count > 0
    }

    pub fn count(&self) -> u32 {
        self.host_count
    }
}
