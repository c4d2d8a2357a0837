//! Traffic selectors (packet-header match predicates) and treatments
//! (forwarding actions).

use std::collections::BTreeMap;
use std::fmt;
use std::net::Ipv4Addr;

use serde::{Deserialize, Serialize};

use crate::types::{MacAddress, PortNumber};

/// IP protocol numbers whose transport ports take part in flow fingerprints.
pub const IP_PROTO_TCP: u8 = 6;
pub const IP_PROTO_UDP: u8 = 17;
pub const IP_PROTO_SCTP: u8 = 132;

/// Discriminant of a [`Criterion`]. A selector holds at most one criterion per type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CriterionType {
    InPort,
    EthSrc,
    EthDst,
    EthType,
    VlanVid,
    IpProto,
    Ipv4Src,
    Ipv4Dst,
    TcpSrc,
    TcpDst,
    UdpSrc,
    UdpDst,
    SctpSrc,
    SctpDst,
}

impl CriterionType {
    fn label(&self) -> &'static str {
        match self {
            CriterionType::InPort => "IN_PORT",
            CriterionType::EthSrc => "ETH_SRC",
            CriterionType::EthDst => "ETH_DST",
            CriterionType::EthType => "ETH_TYPE",
            CriterionType::VlanVid => "VLAN_VID",
            CriterionType::IpProto => "IP_PROTO",
            CriterionType::Ipv4Src => "IPV4_SRC",
            CriterionType::Ipv4Dst => "IPV4_DST",
            CriterionType::TcpSrc => "TCP_SRC",
            CriterionType::TcpDst => "TCP_DST",
            CriterionType::UdpSrc => "UDP_SRC",
            CriterionType::UdpDst => "UDP_DST",
            CriterionType::SctpSrc => "SCTP_SRC",
            CriterionType::SctpDst => "SCTP_DST",
        }
    }

    /// Source-port criterion type for a transport protocol number.
    pub fn transport_src(protocol: u8) -> Option<Self> {
        match protocol {
            IP_PROTO_TCP => Some(CriterionType::TcpSrc),
            IP_PROTO_UDP => Some(CriterionType::UdpSrc),
            IP_PROTO_SCTP => Some(CriterionType::SctpSrc),
            _ => None,
        }
    }

    /// Destination-port criterion type for a transport protocol number.
    pub fn transport_dst(protocol: u8) -> Option<Self> {
        match protocol {
            IP_PROTO_TCP => Some(CriterionType::TcpDst),
            IP_PROTO_UDP => Some(CriterionType::UdpDst),
            IP_PROTO_SCTP => Some(CriterionType::SctpDst),
            _ => None,
        }
    }
}

impl fmt::Display for CriterionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A single match condition over a packet header field.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Criterion {
    InPort(PortNumber),
    EthSrc(MacAddress),
    EthDst(MacAddress),
    EthType(u16),
    VlanVid(u16),
    IpProto(u8),
    Ipv4Src(Ipv4Prefix),
    Ipv4Dst(Ipv4Prefix),
    TcpSrc(u16),
    TcpDst(u16),
    UdpSrc(u16),
    UdpDst(u16),
    SctpSrc(u16),
    SctpDst(u16),
}

impl Criterion {
    pub fn criterion_type(&self) -> CriterionType {
        match self {
            Criterion::InPort(_) => CriterionType::InPort,
            Criterion::EthSrc(_) => CriterionType::EthSrc,
            Criterion::EthDst(_) => CriterionType::EthDst,
            Criterion::EthType(_) => CriterionType::EthType,
            Criterion::VlanVid(_) => CriterionType::VlanVid,
            Criterion::IpProto(_) => CriterionType::IpProto,
            Criterion::Ipv4Src(_) => CriterionType::Ipv4Src,
            Criterion::Ipv4Dst(_) => CriterionType::Ipv4Dst,
            Criterion::TcpSrc(_) => CriterionType::TcpSrc,
            Criterion::TcpDst(_) => CriterionType::TcpDst,
            Criterion::UdpSrc(_) => CriterionType::UdpSrc,
            Criterion::UdpDst(_) => CriterionType::UdpDst,
            Criterion::SctpSrc(_) => CriterionType::SctpSrc,
            Criterion::SctpDst(_) => CriterionType::SctpDst,
        }
    }

    /// Transport port carried by a TCP/UDP/SCTP port criterion.
    pub fn transport_port(&self) -> Option<u16> {
        match self {
            Criterion::TcpSrc(p)
            | Criterion::TcpDst(p)
            | Criterion::UdpSrc(p)
            | Criterion::UdpDst(p)
            | Criterion::SctpSrc(p)
            | Criterion::SctpDst(p) => Some(*p),
            _ => None,
        }
    }
}

impl fmt::Display for Criterion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = self.criterion_type();
        match self {
            Criterion::InPort(port) => write!(f, "{label}:{port}"),
            Criterion::EthSrc(mac) | Criterion::EthDst(mac) => write!(f, "{label}:{mac}"),
            Criterion::EthType(t) => write!(f, "{label}:0x{t:04x}"),
            Criterion::VlanVid(v) => write!(f, "{label}:{v}"),
            Criterion::IpProto(p) => write!(f, "{label}:{p}"),
            Criterion::Ipv4Src(prefix) | Criterion::Ipv4Dst(prefix) => {
                write!(f, "{label}:{prefix}")
            }
            Criterion::TcpSrc(p)
            | Criterion::TcpDst(p)
            | Criterion::UdpSrc(p)
            | Criterion::UdpDst(p)
            | Criterion::SctpSrc(p)
            | Criterion::SctpDst(p) => write!(f, "{label}:{p}"),
        }
    }
}

/// An IPv4 address with prefix length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Ipv4Prefix {
    pub address: Ipv4Addr,
    pub prefix_len: u8,
}

impl Ipv4Prefix {
    pub fn host(address: Ipv4Addr) -> Self {
        Self {
            address,
            prefix_len: 32,
        }
    }
}

impl fmt::Display for Ipv4Prefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.address, self.prefix_len)
    }
}

/// Match predicate over packet header fields.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "Vec<Criterion>", into = "Vec<Criterion>")]
pub struct TrafficSelector {
    criteria: BTreeMap<CriterionType, Criterion>,
}

impl TrafficSelector {
    /// The selector matching all traffic.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn builder() -> TrafficSelectorBuilder {
        TrafficSelectorBuilder::default()
    }

    /// A builder pre-populated with this selector's criteria.
    pub fn to_builder(&self) -> TrafficSelectorBuilder {
        TrafficSelectorBuilder {
            criteria: self.criteria.clone(),
        }
    }

    pub fn criterion(&self, criterion_type: CriterionType) -> Option<&Criterion> {
        self.criteria.get(&criterion_type)
    }

    pub fn criteria(&self) -> impl Iterator<Item = &Criterion> {
        self.criteria.values()
    }

    /// The IP protocol number, if matched.
    pub fn ip_protocol(&self) -> Option<u8> {
        match self.criterion(CriterionType::IpProto) {
            Some(Criterion::IpProto(p)) => Some(*p),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.criteria.is_empty()
    }
}

impl From<Vec<Criterion>> for TrafficSelector {
    fn from(criteria: Vec<Criterion>) -> Self {
        criteria
            .into_iter()
            .fold(TrafficSelector::builder(), TrafficSelectorBuilder::add)
            .build()
    }
}

impl From<TrafficSelector> for Vec<Criterion> {
    fn from(selector: TrafficSelector) -> Self {
        selector.criteria.into_values().collect()
    }
}

/// Builder for [`TrafficSelector`]. Matching a type again replaces the earlier criterion.
#[derive(Debug, Clone, Default)]
pub struct TrafficSelectorBuilder {
    criteria: BTreeMap<CriterionType, Criterion>,
}

impl TrafficSelectorBuilder {
    pub fn add(mut self, criterion: Criterion) -> Self {
        self.criteria.insert(criterion.criterion_type(), criterion);
        self
    }

    /// Drop the criterion of the given type, if any.
    pub fn remove(mut self, criterion_type: CriterionType) -> Self {
        self.criteria.remove(&criterion_type);
        self
    }

    pub fn match_in_port(self, port: PortNumber) -> Self {
        self.add(Criterion::InPort(port))
    }

    pub fn match_eth_src(self, mac: MacAddress) -> Self {
        self.add(Criterion::EthSrc(mac))
    }

    pub fn match_eth_dst(self, mac: MacAddress) -> Self {
        self.add(Criterion::EthDst(mac))
    }

    pub fn match_eth_type(self, eth_type: u16) -> Self {
        self.add(Criterion::EthType(eth_type))
    }

    pub fn match_ip_protocol(self, protocol: u8) -> Self {
        self.add(Criterion::IpProto(protocol))
    }

    pub fn match_ipv4_src(self, prefix: Ipv4Prefix) -> Self {
        self.add(Criterion::Ipv4Src(prefix))
    }

    pub fn match_ipv4_dst(self, prefix: Ipv4Prefix) -> Self {
        self.add(Criterion::Ipv4Dst(prefix))
    }

    pub fn match_tcp_src(self, port: u16) -> Self {
        self.add(Criterion::TcpSrc(port))
    }

    pub fn match_tcp_dst(self, port: u16) -> Self {
        self.add(Criterion::TcpDst(port))
    }

    pub fn match_udp_src(self, port: u16) -> Self {
        self.add(Criterion::UdpSrc(port))
    }

    pub fn match_udp_dst(self, port: u16) -> Self {
        self.add(Criterion::UdpDst(port))
    }

    pub fn build(self) -> TrafficSelector {
        TrafficSelector {
            criteria: self.criteria,
        }
    }
}

/// A single forwarding action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Instruction {
    Output(PortNumber),
    SetEthSrc(MacAddress),
    SetEthDst(MacAddress),
    SetVlan(u16),
    Drop,
}

/// Ordered list of forwarding actions applied to matching traffic.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrafficTreatment {
    instructions: Vec<Instruction>,
}

impl TrafficTreatment {
    /// The treatment that leaves forwarding to the installer.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn new(instructions: Vec<Instruction>) -> Self {
        Self { instructions }
    }

    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }
}
