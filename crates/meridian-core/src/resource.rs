//! Resources, consumers and allocations tracked by the resource ledger.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::intent::{IntentKey, ResourceGroup};
use crate::types::{DeviceId, PortNumber};

/// Link bandwidth, in bits per second.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Bandwidth(f64);

impl Bandwidth {
    pub fn bps(bps: f64) -> Self {
        Self(bps)
    }

    pub fn kbps(kbps: f64) -> Self {
        Self(kbps * 1_000.0)
    }

    pub fn mbps(mbps: f64) -> Self {
        Self(mbps * 1_000_000.0)
    }

    pub fn gbps(gbps: f64) -> Self {
        Self(gbps * 1_000_000_000.0)
    }

    pub fn as_bps(&self) -> f64 {
        self.0
    }
}

impl fmt::Display for Bandwidth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} bps", self.0)
    }
}

/// Kind of quantity a continuous resource measures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Bandwidth,
}

/// Identity of a resource independent of the quantity requested.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ResourceId {
    pub device: DeviceId,
    pub port: PortNumber,
    pub kind: ResourceKind,
}

impl ResourceId {
    pub fn bandwidth(device: DeviceId, port: PortNumber) -> Self {
        Self {
            device,
            port,
            kind: ResourceKind::Bandwidth,
        }
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{:?}", self.device, self.port, self.kind)
    }
}

/// A continuous quantity of a resource, e.g. 10 Mbps on a device port.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    pub id: ResourceId,
    pub value: f64,
}

impl Resource {
    /// Continuous bandwidth bound to a device port.
    pub fn bandwidth(device: DeviceId, port: PortNumber, bandwidth: Bandwidth) -> Self {
        Self {
            id: ResourceId::bandwidth(device, port),
            value: bandwidth.as_bps(),
        }
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.id, self.value)
    }
}

/// The accounting identity that holds allocations.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceConsumer {
    Intent(IntentKey),
    Group(ResourceGroup),
}

impl fmt::Display for ResourceConsumer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceConsumer::Intent(key) => write!(f, "intent:{key}"),
            ResourceConsumer::Group(group) => write!(f, "group:{group}"),
        }
    }
}

impl From<IntentKey> for ResourceConsumer {
    fn from(key: IntentKey) -> Self {
        ResourceConsumer::Intent(key)
    }
}

impl From<ResourceGroup> for ResourceConsumer {
    fn from(group: ResourceGroup) -> Self {
        ResourceConsumer::Group(group)
    }
}

/// A resource held by a consumer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceAllocation {
    pub resource: Resource,
    pub consumer: ResourceConsumer,
}

impl ResourceAllocation {
    pub fn new(resource: Resource, consumer: ResourceConsumer) -> Self {
        Self { resource, consumer }
    }
}
