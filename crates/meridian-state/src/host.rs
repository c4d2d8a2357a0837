//! Host directory.

use std::collections::HashMap;

use meridian_core::{Host, HostId};
use parking_lot::RwLock;

/// Trait for host directories.
pub trait HostService: Send + Sync {
    /// Get a host by id.
    fn host(&self, id: &HostId) -> Option<Host>;

    /// Get all known hosts.
    fn hosts(&self) -> Vec<Host>;
}

/// In-memory implementation of HostService.
pub struct InMemoryHostStore {
    hosts: RwLock<HashMap<HostId, Host>>,
}

impl InMemoryHostStore {
    pub fn new() -> Self {
        Self {
            hosts: RwLock::new(HashMap::new()),
        }
    }

    /// Add or replace a host.
    pub fn add_host(&self, host: Host) {
        self.hosts.write().insert(host.id.clone(), host);
    }

    pub fn remove_host(&self, id: &HostId) -> Option<Host> {
        self.hosts.write().remove(id)
    }
}

impl Default for InMemoryHostStore {
    fn default() -> Self {
        Self::new()
    }
}

impl HostService for InMemoryHostStore {
    fn host(&self, id: &HostId) -> Option<Host> {
        self.hosts.read().get(id).cloned()
    }

    fn hosts(&self) -> Vec<Host> {
        let mut hosts: Vec<Host> = self.hosts.read().values().cloned().collect();
        hosts.sort_by(|a, b| a.id.cmp(&b.id));
        hosts
    }
}
