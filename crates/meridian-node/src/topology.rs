//! Topology file loading.

use std::path::Path;

use anyhow::Context;
use meridian_core::{Bandwidth, DeviceId, Host, Link, PortNumber, ResourceId};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::state::AppState;

/// Bandwidth capacity of a device port.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortCapacity {
    pub device: DeviceId,
    pub port: PortNumber,
    pub bandwidth: Bandwidth,
}

/// A static topology: hosts, links and port capacities.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Topology {
    pub hosts: Vec<Host>,
    pub links: Vec<Link>,
    pub capacities: Vec<PortCapacity>,
}

impl Topology {
    /// Read a topology from a JSON file.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading topology {}", path.display()))?;
        serde_json::from_str(&raw).with_context(|| format!("parsing topology {}", path.display()))
    }

    /// Load the topology into the node's stores.
    pub fn install(self, state: &AppState) {
        info!(
            "Loading {} host(s), {} link(s), {} port capacity entries",
            self.hosts.len(),
            self.links.len(),
            self.capacities.len()
        );
        for host in self.hosts {
            state.hosts.add_host(host);
        }
        for link in self.links {
            state.links.insert(link);
        }
        for capacity in self.capacities {
            state.resources.register_capacity(
                ResourceId::bandwidth(capacity.device, capacity.port),
                capacity.bandwidth.as_bps(),
            );
        }
    }
}
