//! Intent types and builders.
//!
//! A [`HostToHostIntent`] is the declarative request for bidirectional
//! connectivity between two end-stations. Compiling it yields two
//! directional installable intents, either [`LinkCollectionIntent`]s or
//! [`PathIntent`]s.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::constraint::Constraint;
use crate::error::{MeridianError, Result};
use crate::flow::{Criterion, TrafficSelector, TrafficTreatment};
use crate::types::{ConnectPoint, HostId, Link, Path};

/// Priority given to intents that do not set one.
pub const DEFAULT_PRIORITY: u32 = 100;

/// Name of the application owning an intent.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ApplicationId(String);

impl ApplicationId {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ApplicationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identity of an intent, scoped to its owning application.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct IntentKey {
    pub app_id: ApplicationId,
    pub value: String,
}

impl IntentKey {
    pub fn of(value: impl Into<String>, app_id: &ApplicationId) -> Self {
        Self {
            app_id: app_id.clone(),
            value: value.into(),
        }
    }
}

impl fmt::Display for IntentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value)
    }
}

/// Accounting identity shared by intents that pool their reservations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceGroup(pub u64);

impl fmt::Display for ResourceGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// Fields shared by every connectivity intent.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConnectivityIntent {
    pub id: Uuid,
    pub key: IntentKey,
    pub app_id: ApplicationId,
    pub selector: TrafficSelector,
    pub treatment: TrafficTreatment,
    pub constraints: Vec<Constraint>,
    pub priority: u32,
    pub resource_group: Option<ResourceGroup>,
}

impl ConnectivityIntent {
    /// Whether any constraint equals `constraint`.
    pub fn has_constraint(&self, constraint: &Constraint) -> bool {
        self.constraints.contains(constraint)
    }

    /// Base for an installable intent compiled from this one: same key,
    /// application, treatment, constraints, priority and resource group, a
    /// fresh id and its own selector. The not-optical constraint is kept.
    pub fn derive(&self, selector: TrafficSelector) -> ConnectivityIntent {
        let mut constraints = self.constraints.clone();
        let not_optical = Constraint::not_optical();
        if !constraints.contains(&not_optical) {
            constraints.insert(0, not_optical);
        }
        ConnectivityIntent {
            id: Uuid::new_v4(),
            key: self.key.clone(),
            app_id: self.app_id.clone(),
            selector,
            treatment: self.treatment.clone(),
            constraints,
            priority: self.priority,
            resource_group: self.resource_group,
        }
    }
}

/// Access to the connectivity fields and, for host pairs, the endpoints.
pub trait FlowIntent {
    fn connectivity(&self) -> &ConnectivityIntent;

    /// The `(one, two)` endpoints when the intent connects two hosts.
    fn host_pair(&self) -> Option<(&HostId, &HostId)> {
        None
    }
}

impl FlowIntent for ConnectivityIntent {
    fn connectivity(&self) -> &ConnectivityIntent {
        self
    }
}

/// Bidirectional connectivity between two end-stations.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HostToHostIntent {
    #[serde(flatten)]
    base: ConnectivityIntent,
    one: HostId,
    two: HostId,
    /// `[one_to_two, two_to_one]` once compiled.
    #[serde(skip)]
    paths: Option<[Path; 2]>,
}

impl HostToHostIntent {
    pub fn builder() -> HostToHostIntentBuilder {
        HostToHostIntentBuilder::new()
    }

    /// Derive a key that is identical for `(a, b)` and `(b, a)`.
    ///
    /// The smaller host id comes first, followed by the sorted criteria of the
    /// selector. TCP/UDP ports render as bare numbers, so source and
    /// destination ports are not told apart.
    pub fn create_key(
        host_a: &HostId,
        host_b: &HostId,
        selector: &TrafficSelector,
        app_id: &ApplicationId,
    ) -> IntentKey {
        let (first, second) = if host_a.as_str() < host_b.as_str() {
            (host_a, host_b)
        } else {
            (host_b, host_a)
        };
        let mut criteria: Vec<String> = selector.criteria().map(key_component).collect();
        criteria.sort();
        IntentKey::of(
            format!("{first}{second}[{}]", criteria.join(", ")),
            app_id,
        )
    }

    pub fn connectivity(&self) -> &ConnectivityIntent {
        &self.base
    }

    pub fn key(&self) -> &IntentKey {
        &self.base.key
    }

    pub fn app_id(&self) -> &ApplicationId {
        &self.base.app_id
    }

    pub fn selector(&self) -> &TrafficSelector {
        &self.base.selector
    }

    pub fn treatment(&self) -> &TrafficTreatment {
        &self.base.treatment
    }

    pub fn constraints(&self) -> &[Constraint] {
        &self.base.constraints
    }

    pub fn priority(&self) -> u32 {
        self.base.priority
    }

    pub fn resource_group(&self) -> Option<ResourceGroup> {
        self.base.resource_group
    }

    pub fn one(&self) -> &HostId {
        &self.one
    }

    pub fn two(&self) -> &HostId {
        &self.two
    }

    /// The paths computed by the last successful compilation.
    pub fn paths(&self) -> Option<&[Path; 2]> {
        self.paths.as_ref()
    }

    /// Record the computed pair. Only the compiler should call this.
    pub fn set_paths(&mut self, one_to_two: Path, two_to_one: Path) {
        self.paths = Some([one_to_two, two_to_one]);
    }

    /// Forget the computed pair. Only the compiler should call this.
    pub fn clear_paths(&mut self) {
        self.paths = None;
    }

    /// Non-EDGE links of both computed paths, forward path first.
    pub fn routed_links(&self) -> Vec<Link> {
        self.paths
            .iter()
            .flatten()
            .flat_map(|path| path.links())
            .filter(|link| !link.is_edge())
            .cloned()
            .collect()
    }
}

impl FlowIntent for HostToHostIntent {
    fn connectivity(&self) -> &ConnectivityIntent {
        &self.base
    }

    fn host_pair(&self) -> Option<(&HostId, &HostId)> {
        Some((&self.one, &self.two))
    }
}

fn key_component(criterion: &Criterion) -> String {
    match criterion {
        Criterion::TcpSrc(port)
        | Criterion::TcpDst(port)
        | Criterion::UdpSrc(port)
        | Criterion::UdpDst(port) => port.to_string(),
        other => other.to_string(),
    }
}

/// Builder for [`HostToHostIntent`]s.
#[derive(Debug, Default)]
pub struct HostToHostIntentBuilder {
    app_id: Option<ApplicationId>,
    key: Option<IntentKey>,
    one: Option<HostId>,
    two: Option<HostId>,
    selector: TrafficSelector,
    treatment: TrafficTreatment,
    constraints: Vec<Constraint>,
    priority: Option<u32>,
    resource_group: Option<ResourceGroup>,
}

impl HostToHostIntentBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn app_id(mut self, app_id: ApplicationId) -> Self {
        self.app_id = Some(app_id);
        self
    }

    /// Set an explicit key instead of deriving one from hosts and selector.
    pub fn key(mut self, key: IntentKey) -> Self {
        self.key = Some(key);
        self
    }

    pub fn one(mut self, one: HostId) -> Self {
        self.one = Some(one);
        self
    }

    pub fn two(mut self, two: HostId) -> Self {
        self.two = Some(two);
        self
    }

    pub fn selector(mut self, selector: TrafficSelector) -> Self {
        self.selector = selector;
        self
    }

    pub fn treatment(mut self, treatment: TrafficTreatment) -> Self {
        self.treatment = treatment;
        self
    }

    /// Add a constraint.
    pub fn constraint(mut self, constraint: Constraint) -> Self {
        self.constraints.push(constraint);
        self
    }

    /// Replace all constraints.
    pub fn constraints(mut self, constraints: Vec<Constraint>) -> Self {
        self.constraints = constraints;
        self
    }

    pub fn priority(mut self, priority: u32) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn resource_group(mut self, group: ResourceGroup) -> Self {
        self.resource_group = Some(group);
        self
    }

    /// Build the intent, adding the not-optical constraint in front unless present.
    pub fn build(self) -> Result<HostToHostIntent> {
        let missing = |member: &str| MeridianError::IntentInvalid {
            key: self.key.as_ref().map(|k| k.value.clone()),
            message: format!("{member} member is required"),
        };
        let app_id = self.app_id.clone().ok_or_else(|| missing("app_id"))?;
        let one = self.one.clone().ok_or_else(|| missing("one"))?;
        let two = self.two.clone().ok_or_else(|| missing("two"))?;

        let mut constraints = self.constraints;
        let not_optical = Constraint::not_optical();
        if !constraints.contains(&not_optical) {
            constraints.insert(0, not_optical);
        }

        let key = self
            .key
            .unwrap_or_else(|| HostToHostIntent::create_key(&one, &two, &self.selector, &app_id));

        Ok(HostToHostIntent {
            base: ConnectivityIntent {
                id: Uuid::new_v4(),
                key,
                app_id,
                selector: self.selector,
                treatment: self.treatment,
                constraints,
                priority: self.priority.unwrap_or(DEFAULT_PRIORITY),
                resource_group: self.resource_group,
            },
            one,
            two,
            paths: None,
        })
    }
}

/// A connect point with an additional match on traffic entering or leaving it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilteredConnectPoint {
    pub connect_point: ConnectPoint,
    #[serde(default)]
    pub meta: TrafficSelector,
}

impl FilteredConnectPoint {
    pub fn new(connect_point: ConnectPoint) -> Self {
        Self {
            connect_point,
            meta: TrafficSelector::empty(),
        }
    }
}

/// Forwarding over a set of core links between filtered ingress and egress points.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LinkCollectionIntent {
    #[serde(flatten)]
    pub base: ConnectivityIntent,
    pub links: Vec<Link>,
    pub ingress_points: Vec<FilteredConnectPoint>,
    pub egress_points: Vec<FilteredConnectPoint>,
    /// Apply the treatment at the egress point rather than at ingress.
    pub apply_treatment_on_egress: bool,
}

impl FlowIntent for LinkCollectionIntent {
    fn connectivity(&self) -> &ConnectivityIntent {
        &self.base
    }
}

/// Forwarding along one explicit path.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PathIntent {
    #[serde(flatten)]
    pub base: ConnectivityIntent,
    pub path: Path,
}

impl FlowIntent for PathIntent {
    fn connectivity(&self) -> &ConnectivityIntent {
        &self.base
    }
}

/// Any intent the framework may hand to or receive from a compiler.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Intent {
    HostToHost(HostToHostIntent),
    LinkCollection(LinkCollectionIntent),
    Path(PathIntent),
}

impl Intent {
    pub fn connectivity(&self) -> &ConnectivityIntent {
        match self {
            Intent::HostToHost(intent) => intent.connectivity(),
            Intent::LinkCollection(intent) => &intent.base,
            Intent::Path(intent) => &intent.base,
        }
    }

    pub fn key(&self) -> &IntentKey {
        &self.connectivity().key
    }

    pub fn selector(&self) -> &TrafficSelector {
        &self.connectivity().selector
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flow::IP_PROTO_TCP;
    use proptest::prelude::*;

    fn app() -> ApplicationId {
        ApplicationId::new("org.meridian.test")
    }

    fn host(n: u8) -> HostId {
        HostId::new(format!("00:00:00:00:00:{n:02x}/None"))
    }

    #[test]
    fn test_builder_injects_not_optical() {
        let intent = HostToHostIntent::builder()
            .app_id(app())
            .one(host(1))
            .two(host(2))
            .constraint(Constraint::AsymmetricPath)
            .build()
            .unwrap();

        assert_eq!(intent.constraints()[0], Constraint::not_optical());
        assert_eq!(intent.constraints().len(), 2);
        assert_eq!(intent.priority(), DEFAULT_PRIORITY);
        assert!(intent.paths().is_none());
    }

    #[test]
    fn test_builder_keeps_supplied_not_optical() {
        let intent = HostToHostIntent::builder()
            .app_id(app())
            .one(host(1))
            .two(host(2))
            .constraint(Constraint::AsymmetricPath)
            .constraint(Constraint::not_optical())
            .build()
            .unwrap();

        assert_eq!(intent.constraints().len(), 2);
        assert_eq!(intent.constraints()[0], Constraint::AsymmetricPath);
    }

    #[test]
    fn test_builder_missing_host() {
        let result = HostToHostIntent::builder().app_id(app()).one(host(1)).build();
        assert!(matches!(
            result,
            Err(MeridianError::IntentInvalid { message, .. }) if message.contains("two")
        ));
    }

    #[test]
    fn test_create_key_renders_ports_bare() {
        let selector = TrafficSelector::builder()
            .match_ip_protocol(IP_PROTO_TCP)
            .match_tcp_src(5001)
            .match_tcp_dst(80)
            .build();
        let key = HostToHostIntent::create_key(&host(2), &host(1), &selector, &app());
        assert_eq!(
            key.value,
            "00:00:00:00:00:01/None00:00:00:00:00:02/None[5001, 80, IP_PROTO:6]"
        );
    }

    #[test]
    fn test_set_paths_and_routed_links() {
        use crate::types::{LinkType, ProviderId};

        let mut intent = HostToHostIntent::builder()
            .app_id(app())
            .one(host(1))
            .two(host(2))
            .build()
            .unwrap();
        let links = vec![
            Link::new(ConnectPoint::host(host(1)), ConnectPoint::device("s1", 1), LinkType::Edge),
            Link::new(ConnectPoint::device("s1", 2), ConnectPoint::device("s2", 1), LinkType::Direct),
            Link::new(ConnectPoint::device("s2", 2), ConnectPoint::host(host(2)), LinkType::Edge),
        ];
        let path = Path::new(ProviderId::core(), links, 3.0).unwrap();
        intent.set_paths(path.clone(), path.inverted());

        let routed = intent.routed_links();
        assert_eq!(routed.len(), 2);
        assert_eq!(routed[0].src, ConnectPoint::device("s1", 2));
        assert_eq!(routed[1].src, ConnectPoint::device("s2", 1));

        intent.clear_paths();
        assert!(intent.routed_links().is_empty());
    }

    proptest! {
        #[test]
        fn prop_create_key_is_symmetric(
            a in "[0-9a-f:]{1,17}",
            b in "[0-9a-f:]{1,17}",
            proto in prop::option::of(any::<u8>()),
            src in prop::option::of(any::<u16>()),
            dst in prop::option::of(any::<u16>()),
        ) {
            let mut builder = TrafficSelector::builder();
            if let Some(p) = proto {
                builder = builder.match_ip_protocol(p);
            }
            if let Some(p) = src {
                builder = builder.match_udp_src(p);
            }
            if let Some(p) = dst {
                builder = builder.match_tcp_dst(p);
            }
            let selector = builder.build();
            let (ha, hb) = (HostId::new(a), HostId::new(b));
            prop_assert_eq!(
                HostToHostIntent::create_key(&ha, &hb, &selector, &app()),
                HostToHostIntent::create_key(&hb, &ha, &selector, &app())
            );
        }
    }
}
