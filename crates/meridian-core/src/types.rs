//! Network model shared across Meridian: element identifiers, connect
//! points, links, paths and hosts.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{MeridianError, Result};

/// Identifier of an infrastructure device (switch).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceId(String);

impl DeviceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of an end-station, conventionally `MAC/VLAN`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HostId(String);

impl HostId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for HostId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Port number on a device. Hosts attach through port 0.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct PortNumber(pub u64);

impl fmt::Display for PortNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Either end of a link: a device or a host.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElementId {
    Device(DeviceId),
    Host(HostId),
}

impl ElementId {
    pub fn is_device(&self) -> bool {
        matches!(self, ElementId::Device(_))
    }
}

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ElementId::Device(id) => id.fmt(f),
            ElementId::Host(id) => id.fmt(f),
        }
    }
}

impl From<DeviceId> for ElementId {
    fn from(id: DeviceId) -> Self {
        ElementId::Device(id)
    }
}

impl From<HostId> for ElementId {
    fn from(id: HostId) -> Self {
        ElementId::Host(id)
    }
}

/// A device-and-port (or host) attachment point.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ConnectPoint {
    pub element_id: ElementId,
    pub port: PortNumber,
}

impl ConnectPoint {
    pub fn new(element_id: ElementId, port: PortNumber) -> Self {
        Self { element_id, port }
    }

    /// Connect point on a device port.
    pub fn device(id: impl Into<String>, port: u64) -> Self {
        Self::new(ElementId::Device(DeviceId::new(id)), PortNumber(port))
    }

    /// Host-side end of an edge link.
    pub fn host(id: HostId) -> Self {
        Self::new(ElementId::Host(id), PortNumber(0))
    }

    /// Returns the device id when this point is rooted on a device.
    pub fn device_id(&self) -> Option<&DeviceId> {
        match &self.element_id {
            ElementId::Device(id) => Some(id),
            ElementId::Host(_) => None,
        }
    }
}

impl fmt::Display for ConnectPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.element_id, self.port)
    }
}

/// Kind of a link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkType {
    /// Direct infrastructure link between two devices.
    Direct,
    /// Link traversing an intermediate, unmanaged network.
    Indirect,
    /// Link attaching a host to a device.
    Edge,
    Tunnel,
    Optical,
    Virtual,
}

/// Operational state of a link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkState {
    #[default]
    Active,
    Inactive,
}

/// Identity of the component that provided a piece of topology.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ProviderId {
    pub scheme: String,
    pub id: String,
}

impl ProviderId {
    pub fn new(scheme: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            scheme: scheme.into(),
            id: id.into(),
        }
    }

    /// Provider used for topology that no specific provider claims.
    pub fn core() -> Self {
        Self::new("core", "meridian.core")
    }
}

impl Default for ProviderId {
    fn default() -> Self {
        Self::core()
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.scheme, self.id)
    }
}

/// String key/value attributes attached to a link.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Annotations(BTreeMap<String, String>);

impl Annotations {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn value(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Numeric value of an annotation; missing or unparseable values count as 0.
    pub fn numeric(&self, key: &str) -> f64 {
        self.value(key)
            .and_then(|v| v.trim().parse::<f64>().ok())
            .unwrap_or(0.0)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Annotations {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// A unidirectional link between two connect points.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Link {
    #[serde(default)]
    pub provider_id: ProviderId,
    pub src: ConnectPoint,
    pub dst: ConnectPoint,
    #[serde(rename = "type")]
    pub link_type: LinkType,
    #[serde(default)]
    pub state: LinkState,
    #[serde(default)]
    pub expected: bool,
    #[serde(default)]
    pub annotations: Annotations,
}

impl Link {
    /// Create an active, unannotated link from the core provider.
    pub fn new(src: ConnectPoint, dst: ConnectPoint, link_type: LinkType) -> Self {
        Self {
            provider_id: ProviderId::core(),
            src,
            dst,
            link_type,
            state: LinkState::Active,
            expected: false,
            annotations: Annotations::new(),
        }
    }

    /// Set an annotation.
    pub fn with_annotation(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.annotations.set(key, value);
        self
    }

    /// Set the link state.
    pub fn with_state(mut self, state: LinkState) -> Self {
        self.state = state;
        self
    }

    pub fn is_edge(&self) -> bool {
        self.link_type == LinkType::Edge
    }

    /// The reverse counterpart: endpoints swapped, type/state/provider/expected
    /// kept, no annotations.
    pub fn reversed(&self) -> Self {
        Self {
            provider_id: self.provider_id.clone(),
            src: self.dst.clone(),
            dst: self.src.clone(),
            link_type: self.link_type,
            state: self.state,
            expected: self.expected,
            annotations: Annotations::new(),
        }
    }

    /// Description of this link carrying replacement annotations.
    pub fn describe(&self, annotations: Annotations) -> LinkDescription {
        LinkDescription {
            src: self.src.clone(),
            dst: self.dst.clone(),
            link_type: self.link_type,
            expected: self.expected,
            annotations,
        }
    }
}

impl fmt::Display for Link {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}->{}", self.src, self.dst)
    }
}

/// What a provider reports about a link when creating or updating it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkDescription {
    pub src: ConnectPoint,
    pub dst: ConnectPoint,
    #[serde(rename = "type")]
    pub link_type: LinkType,
    #[serde(default)]
    pub expected: bool,
    #[serde(default)]
    pub annotations: Annotations,
}

/// An ordered sequence of links with an aggregate cost. Consecutive links
/// meet at the same element; the port may change inside a device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "PathFields")]
pub struct Path {
    pub provider_id: ProviderId,
    links: Vec<Link>,
    cost: f64,
}

/// Serialized form of a [`Path`], checked by [`Path::new`] on the way in.
#[derive(Deserialize)]
struct PathFields {
    provider_id: ProviderId,
    links: Vec<Link>,
    cost: f64,
}

impl TryFrom<PathFields> for Path {
    type Error = MeridianError;

    fn try_from(fields: PathFields) -> Result<Self> {
        Path::new(fields.provider_id, fields.links, fields.cost)
    }
}

impl Path {
    /// Create a path, checking that it is non-empty and contiguous.
    pub fn new(provider_id: ProviderId, links: Vec<Link>, cost: f64) -> Result<Self> {
        if links.is_empty() {
            return Err(MeridianError::InvalidPath(
                "path must contain at least one link".to_string(),
            ));
        }
        if let Some(gap) = links
            .windows(2)
            .find(|w| w[0].dst.element_id != w[1].src.element_id)
        {
            return Err(MeridianError::InvalidPath(format!(
                "link {} does not continue from {}",
                gap[1], gap[0]
            )));
        }
        Ok(Self {
            provider_id,
            links,
            cost,
        })
    }

    pub fn links(&self) -> &[Link] {
        &self.links
    }

    pub fn cost(&self) -> f64 {
        self.cost
    }

    pub fn src(&self) -> &ConnectPoint {
        &self.links[0].src
    }

    pub fn dst(&self) -> &ConnectPoint {
        &self.links[self.links.len() - 1].dst
    }

    /// Every connect point traversed, in order (`src` then `dst` per link).
    pub fn connect_points(&self) -> Vec<ConnectPoint> {
        self.links
            .iter()
            .flat_map(|l| [l.src.clone(), l.dst.clone()])
            .collect()
    }

    /// The reverse path: link order reversed and every link reversed.
    ///
    /// Assumes each link has a usable reverse counterpart; nothing checks it.
    pub fn inverted(&self) -> Self {
        Self {
            provider_id: self.provider_id.clone(),
            links: self.links.iter().rev().map(Link::reversed).collect(),
            cost: self.cost,
        }
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hops: Vec<String> = self.links.iter().map(|l| l.to_string()).collect();
        write!(f, "[{}] cost={}", hops.join(", "), self.cost)
    }
}

/// Two paths between the same endpoints sharing no links or transit nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisjointPath {
    pub primary: Path,
    pub backup: Path,
}

/// A 48-bit Ethernet address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MacAddress([u8; 6]);

impl MacAddress {
    pub const fn new(octets: [u8; 6]) -> Self {
        Self(octets)
    }

    pub fn octets(&self) -> [u8; 6] {
        self.0
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let o = self.0;
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            o[0], o[1], o[2], o[3], o[4], o[5]
        )
    }
}

impl FromStr for MacAddress {
    type Err = MeridianError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || MeridianError::SerializationError(format!("invalid MAC address {s:?}"));
        let mut octets = [0u8; 6];
        let mut parts = s.split(':');
        for octet in octets.iter_mut() {
            let part = parts.next().ok_or_else(invalid)?;
            if part.len() != 2 {
                return Err(invalid());
            }
            *octet = u8::from_str_radix(part, 16).map_err(|_| invalid())?;
        }
        if parts.next().is_some() {
            return Err(invalid());
        }
        Ok(Self(octets))
    }
}

impl TryFrom<String> for MacAddress {
    type Error = MeridianError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<MacAddress> for String {
    fn from(mac: MacAddress) -> Self {
        mac.to_string()
    }
}

/// An end-station known to the host directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Host {
    pub id: HostId,
    pub mac: MacAddress,
    #[serde(default)]
    pub vlan: Option<u16>,
    /// Attachment points, most relevant first.
    #[serde(default)]
    pub locations: Vec<ConnectPoint>,
    #[serde(default)]
    pub ip_addresses: BTreeSet<IpAddr>,
}

impl Host {
    pub fn new(id: HostId, mac: MacAddress) -> Self {
        Self {
            id,
            mac,
            vlan: None,
            locations: Vec::new(),
            ip_addresses: BTreeSet::new(),
        }
    }

    /// Attach the host at a location.
    pub fn located_at(mut self, location: ConnectPoint) -> Self {
        self.locations.push(location);
        self
    }

    /// Add an IP address.
    pub fn with_ip(mut self, ip: IpAddr) -> Self {
        self.ip_addresses.insert(ip);
        self
    }

    /// The primary attachment point.
    pub fn location(&self) -> Option<&ConnectPoint> {
        self.locations.first()
    }
}
