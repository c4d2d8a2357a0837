//! Host-to-host intent compilation.
//!
//! A [`HostToHostIntent`] compiles into two installable intents, one per
//! direction. The reverse path is the inverted forward path unless the
//! intent carries [`Constraint::AsymmetricPath`].

use std::sync::Arc;

use meridian_core::{
    Constraint, Criterion, CriterionType, ElementId, FilteredConnectPoint, Host, HostId,
    HostToHostIntent, Intent, Link, LinkCollectionIntent, MeridianError, Path, PathIntent,
    ResourceConsumer, Result, TrafficSelector,
};
use meridian_planner::{PathSelector, PathService};
use meridian_state::{HostService, LinkStore, ResourceService};
use parking_lot::Mutex;
use tracing::{debug, info};

use crate::annotation::{AnnotationDirection, AnnotationReconciler};
use crate::bandwidth::BandwidthReconciler;
use crate::config::{CompilerConfig, SubIntentFlavor};

/// Trait for intent compilers.
pub trait IntentCompiler<T>: Send + Sync {
    /// Compile `intent` into installable intents. `installable` holds the
    /// result of the previous compilation, if any.
    fn compile(&self, intent: &mut T, installable: &[Intent]) -> Result<Vec<Intent>>;
}

/// Compiles host-to-host intents into a pair of directional intents.
pub struct HostToHostCompiler {
    paths: Arc<dyn PathService>,
    hosts: Arc<dyn HostService>,
    links: Arc<dyn LinkStore>,
    resources: Arc<dyn ResourceService>,
    config: CompilerConfig,
    /// Serializes compile and withdraw.
    lock: Mutex<()>,
}

impl HostToHostCompiler {
    /// Create a compiler with default configuration.
    pub fn new(
        paths: Arc<dyn PathService>,
        hosts: Arc<dyn HostService>,
        links: Arc<dyn LinkStore>,
        resources: Arc<dyn ResourceService>,
    ) -> Self {
        Self::with_config(paths, hosts, links, resources, CompilerConfig::default())
    }

    /// Create a compiler with custom configuration.
    pub fn with_config(
        paths: Arc<dyn PathService>,
        hosts: Arc<dyn HostService>,
        links: Arc<dyn LinkStore>,
        resources: Arc<dyn ResourceService>,
        config: CompilerConfig,
    ) -> Self {
        Self {
            paths,
            hosts,
            links,
            resources,
            config,
            lock: Mutex::new(()),
        }
    }

    pub fn config(&self) -> &CompilerConfig {
        &self.config
    }

    /// Undo the side effects of an intent's last compilation: remove its
    /// annotation contribution, forget its paths and release the bandwidth
    /// held under its key. Allocations held by its resource group stay.
    pub fn withdraw(&self, intent: &mut HostToHostIntent) -> Result<()> {
        let _guard = self.lock.lock();

        if intent.paths().is_some() {
            self.annotations()
                .apply(intent.constraints(), &intent.routed_links(), AnnotationDirection::Remove)?;
            intent.clear_paths();
        }

        let held = self
            .resources
            .resource_allocations(&ResourceConsumer::Intent(intent.key().clone()));
        if !held.is_empty() {
            debug!("Releasing {} allocation(s) of intent {}", held.len(), intent.key());
            if !self.resources.release(&held) {
                debug!("Some allocation(s) of intent {} were not held", intent.key());
            }
        }

        info!("Withdrew intent {}", intent.key());
        Ok(())
    }

    fn annotations(&self) -> AnnotationReconciler<'_> {
        AnnotationReconciler::new(
            self.links.as_ref(),
            &self.config.annotation_provider,
            self.config.annotation_write_attempts,
        )
    }

    fn host(&self, id: &HostId) -> Result<Host> {
        self.hosts
            .host(id)
            .ok_or_else(|| MeridianError::HostNotFound(id.clone()))
    }

    /// Build the installable intent carrying traffic from `src` to `dst` along `path`.
    fn create_sub_intent(
        &self,
        intent: &HostToHostIntent,
        bandwidth: &BandwidthReconciler<'_>,
        path: &Path,
        src: &Host,
        dst: &Host,
    ) -> Result<Intent> {
        bandwidth.reconcile(intent.connectivity(), &path.connect_points());

        let mut builder = intent.selector().to_builder().match_eth_src(src.mac);
        if self.config.sub_intent_flavor == SubIntentFlavor::Path {
            builder = builder.match_eth_dst(dst.mac);
        }
        let mut selector = builder.build();
        if intent.one() == &dst.id && intent.two() == &src.id {
            selector = invert_transport_ports(selector);
        }

        let base = intent.connectivity().derive(selector);
        let sub_intent = match self.config.sub_intent_flavor {
            SubIntentFlavor::LinkCollection => {
                let links = path.links();
                let ingress = device_point(&links[0])?;
                let egress = device_point(&links[links.len() - 1])?;
                Intent::LinkCollection(LinkCollectionIntent {
                    base,
                    links: links.iter().filter(|l| !l.is_edge()).cloned().collect(),
                    ingress_points: vec![ingress],
                    egress_points: vec![egress],
                    apply_treatment_on_egress: true,
                })
            }
            SubIntentFlavor::Path => Intent::Path(PathIntent {
                base,
                path: path.clone(),
            }),
        };
        Ok(sub_intent)
    }
}

impl IntentCompiler<HostToHostIntent> for HostToHostCompiler {
    fn compile(&self, intent: &mut HostToHostIntent, _installable: &[Intent]) -> Result<Vec<Intent>> {
        let _guard = self.lock.lock();

        if intent.one() == intent.two() {
            debug!("Intent {} connects {} to itself", intent.key(), intent.one());
            return Ok(Vec::new());
        }

        let annotations = self.annotations();

        // The old contribution goes before any path is recomputed. A failed
        // removal writes nothing, so the paths stay for the next attempt.
        if intent.paths().is_some() {
            annotations.apply(
                intent.constraints(),
                &intent.routed_links(),
                AnnotationDirection::Remove,
            )?;
            intent.clear_paths();
        }

        let selector = PathSelector::new(
            self.paths.as_ref(),
            self.hosts.as_ref(),
            self.links.as_ref(),
            self.resources.as_ref(),
        );
        let one = ElementId::Host(intent.one().clone());
        let two = ElementId::Host(intent.two().clone());

        let one_to_two = selector.select_path(&*intent, &one, &two)?;
        let two_to_one = if intent
            .connectivity()
            .has_constraint(&Constraint::AsymmetricPath)
        {
            selector.select_path(&*intent, &two, &one)?
        } else {
            one_to_two.inverted()
        };

        let host_one = self.host(intent.one())?;
        let host_two = self.host(intent.two())?;

        intent.set_paths(one_to_two.clone(), two_to_one.clone());
        if let Err(err) = annotations.apply(
            intent.constraints(),
            &intent.routed_links(),
            AnnotationDirection::Add,
        ) {
            intent.clear_paths();
            return Err(err);
        }

        let bandwidth = BandwidthReconciler::new(self.resources.as_ref());
        let forward = self.create_sub_intent(intent, &bandwidth, &one_to_two, &host_one, &host_two)?;
        let reverse = self.create_sub_intent(intent, &bandwidth, &two_to_one, &host_two, &host_one)?;

        info!(
            "Compiled intent {}: {} hop(s) forward, {} hop(s) reverse",
            intent.key(),
            one_to_two.links().len(),
            two_to_one.links().len()
        );
        Ok(vec![forward, reverse])
    }
}

/// The device end of a path's first or last link.
fn device_point(link: &Link) -> Result<FilteredConnectPoint> {
    [&link.src, &link.dst]
        .into_iter()
        .find(|point| point.element_id.is_device())
        .map(|point| FilteredConnectPoint::new(point.clone()))
        .ok_or_else(|| {
            MeridianError::IntentCompilation(format!("link {link} has no device endpoint"))
        })
}

/// Swap TCP and UDP source and destination ports when the selector matches
/// an IP protocol.
fn invert_transport_ports(selector: TrafficSelector) -> TrafficSelector {
    if selector.ip_protocol().is_none() {
        return selector;
    }

    let mut builder = selector
        .to_builder()
        .remove(CriterionType::TcpSrc)
        .remove(CriterionType::TcpDst)
        .remove(CriterionType::UdpSrc)
        .remove(CriterionType::UdpDst);
    for criterion in selector.criteria() {
        builder = match criterion {
            Criterion::TcpSrc(port) => builder.match_tcp_dst(*port),
            Criterion::TcpDst(port) => builder.match_tcp_src(*port),
            Criterion::UdpSrc(port) => builder.match_udp_dst(*port),
            Criterion::UdpDst(port) => builder.match_udp_src(*port),
            _ => builder,
        };
    }
    builder.build()
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use meridian_core::flow::{IP_PROTO_TCP, IP_PROTO_UDP};
    use meridian_core::{
        ApplicationId, Bandwidth, ConnectPoint, DisjointPath, LinkType, ProviderId, ResourceGroup,
    };
    use meridian_planner::LinkWeigher;
    use meridian_state::{InMemoryHostStore, InMemoryLinkStore, InMemoryResourceStore};

    const MAC_ONE: &str = "aa:aa:aa:aa:aa:aa";
    const MAC_TWO: &str = "bb:bb:bb:bb:bb:bb";

    /// Returns fixed candidates per endpoint pair.
    #[derive(Default)]
    struct FixedPaths {
        routes: HashMap<(ElementId, ElementId), Vec<Path>>,
    }

    impl PathService for FixedPaths {
        fn paths(&self, src: &ElementId, dst: &ElementId, _: &dyn LinkWeigher) -> Vec<Path> {
            self.routes
                .get(&(src.clone(), dst.clone()))
                .cloned()
                .unwrap_or_default()
        }

        fn disjoint_paths(&self, _: &ElementId, _: &ElementId, _: &dyn LinkWeigher) -> Vec<DisjointPath> {
            Vec::new()
        }
    }

    struct Fixture {
        links: Arc<InMemoryLinkStore>,
        resources: Arc<InMemoryResourceStore>,
        compiler: HostToHostCompiler,
    }

    fn one() -> HostId {
        HostId::new(format!("{MAC_ONE}/None"))
    }

    fn two() -> HostId {
        HostId::new(format!("{MAC_TWO}/None"))
    }

    /// one -> s1 -> s3 -> two
    fn forward_path() -> Path {
        Path::new(
            ProviderId::core(),
            vec![
                Link::new(ConnectPoint::host(one()), ConnectPoint::device("s1", 3), LinkType::Edge),
                Link::new(ConnectPoint::device("s1", 1), ConnectPoint::device("s3", 1), LinkType::Direct),
                Link::new(ConnectPoint::device("s3", 3), ConnectPoint::host(two()), LinkType::Edge),
            ],
            3.0,
        )
        .unwrap()
    }

    /// two -> s3 -> s2 -> s1 -> one
    fn detour_path() -> Path {
        Path::new(
            ProviderId::core(),
            vec![
                Link::new(ConnectPoint::host(two()), ConnectPoint::device("s3", 3), LinkType::Edge),
                Link::new(ConnectPoint::device("s3", 2), ConnectPoint::device("s2", 1), LinkType::Direct),
                Link::new(ConnectPoint::device("s2", 2), ConnectPoint::device("s1", 2), LinkType::Direct),
                Link::new(ConnectPoint::device("s1", 3), ConnectPoint::host(one()), LinkType::Edge),
            ],
            4.0,
        )
        .unwrap()
    }

    fn fixture(config: CompilerConfig) -> Fixture {
        let mut paths = FixedPaths::default();
        paths.routes.insert(
            (one().into(), two().into()),
            vec![forward_path()],
        );
        paths.routes.insert(
            (two().into(), one().into()),
            vec![detour_path()],
        );

        let links = Arc::new(InMemoryLinkStore::new());
        let core = forward_path().links()[1].clone().with_annotation("latency", "10");
        links.insert(core.reversed().with_annotation("latency", "10"));
        links.insert(core);

        let hosts = Arc::new(InMemoryHostStore::new());
        hosts.add_host(
            Host::new(one(), MAC_ONE.parse().unwrap()).located_at(ConnectPoint::device("s1", 3)),
        );
        hosts.add_host(
            Host::new(two(), MAC_TWO.parse().unwrap()).located_at(ConnectPoint::device("s3", 3)),
        );

        let resources = Arc::new(InMemoryResourceStore::new());
        let compiler = HostToHostCompiler::with_config(
            Arc::new(paths),
            hosts,
            links.clone(),
            resources.clone(),
            config,
        );
        Fixture {
            links,
            resources,
            compiler,
        }
    }

    fn intent() -> meridian_core::HostToHostIntentBuilder {
        HostToHostIntent::builder()
            .app_id(ApplicationId::new("org.meridian.test"))
            .one(one())
            .two(two())
    }

    fn link_collection(intent: &Intent) -> &LinkCollectionIntent {
        match intent {
            Intent::LinkCollection(lc) => lc,
            other => panic!("expected a link collection intent, got {other:?}"),
        }
    }

    fn latency(store: &InMemoryLinkStore, src: ConnectPoint, dst: ConnectPoint) -> String {
        store
            .link(&src, &dst)
            .and_then(|l| l.annotations.value("latency").map(str::to_string))
            .unwrap_or_default()
    }

    #[test]
    fn test_self_loop_compiles_to_nothing() {
        let fixture = fixture(CompilerConfig::default());
        let mut looped = intent().two(one()).build().unwrap();

        let result = fixture.compiler.compile(&mut looped, &[]).unwrap();
        assert!(result.is_empty());
        assert!(looped.paths().is_none());
    }

    #[test]
    fn test_compiles_one_intent_per_direction() {
        let fixture = fixture(CompilerConfig::default());
        let mut h2h = intent().build().unwrap();

        let result = fixture.compiler.compile(&mut h2h, &[]).unwrap();
        assert_eq!(result.len(), 2);

        let forward = link_collection(&result[0]);
        assert_eq!(
            forward.base.selector.criterion(CriterionType::EthSrc),
            Some(&Criterion::EthSrc(MAC_ONE.parse().unwrap()))
        );
        assert_eq!(forward.links, vec![forward_path().links()[1].clone()]);
        assert_eq!(forward.ingress_points[0].connect_point, ConnectPoint::device("s1", 3));
        assert_eq!(forward.egress_points[0].connect_point, ConnectPoint::device("s3", 3));
        assert!(forward.apply_treatment_on_egress);

        let reverse = link_collection(&result[1]);
        assert_eq!(
            reverse.base.selector.criterion(CriterionType::EthSrc),
            Some(&Criterion::EthSrc(MAC_TWO.parse().unwrap()))
        );
        assert_eq!(reverse.links, vec![forward_path().links()[1].reversed()]);
        assert_eq!(reverse.ingress_points[0].connect_point, ConnectPoint::device("s3", 3));
        assert_eq!(reverse.egress_points[0].connect_point, ConnectPoint::device("s1", 3));

        let paths = h2h.paths().unwrap();
        assert_eq!(paths[0], forward_path());
        assert_eq!(paths[1], forward_path().inverted());
    }

    #[test]
    fn test_sub_intents_carry_intent_fields() {
        let fixture = fixture(CompilerConfig::default());
        let mut h2h = intent()
            .priority(300)
            .resource_group(ResourceGroup(9))
            .constraint(Constraint::PathViability)
            .build()
            .unwrap();

        let result = fixture.compiler.compile(&mut h2h, &[]).unwrap();
        for sub_intent in &result {
            let base = sub_intent.connectivity();
            assert_eq!(&base.key, h2h.key());
            assert_eq!(&base.app_id, h2h.app_id());
            assert_eq!(base.priority, 300);
            assert_eq!(base.resource_group, Some(ResourceGroup(9)));
            assert_eq!(base.constraints, h2h.constraints());
            assert!(base.has_constraint(&Constraint::not_optical()));
            assert_ne!(base.id, h2h.connectivity().id);
        }
    }

    #[test]
    fn test_path_flavor_matches_both_macs() {
        let fixture = fixture(CompilerConfig {
            sub_intent_flavor: SubIntentFlavor::Path,
            ..CompilerConfig::default()
        });
        let mut h2h = intent().build().unwrap();

        let result = fixture.compiler.compile(&mut h2h, &[]).unwrap();
        let Intent::Path(reverse) = &result[1] else {
            panic!("expected a path intent");
        };
        assert_eq!(reverse.path, forward_path().inverted());
        assert_eq!(
            reverse.base.selector.criterion(CriterionType::EthDst),
            Some(&Criterion::EthDst(MAC_ONE.parse().unwrap()))
        );
    }

    #[test]
    fn test_asymmetric_paths_are_selected_independently() {
        let fixture = fixture(CompilerConfig::default());
        let mut h2h = intent().constraint(Constraint::AsymmetricPath).build().unwrap();

        let result = fixture.compiler.compile(&mut h2h, &[]).unwrap();
        assert_eq!(h2h.paths().unwrap()[1], detour_path());
        assert_eq!(link_collection(&result[1]).links.len(), 2);
    }

    #[test]
    fn test_reverse_direction_inverts_transport_ports() {
        let fixture = fixture(CompilerConfig::default());
        let selector = TrafficSelector::builder()
            .match_ip_protocol(IP_PROTO_TCP)
            .match_tcp_src(40000)
            .match_tcp_dst(80)
            .build();
        let mut h2h = intent().selector(selector).build().unwrap();

        let result = fixture.compiler.compile(&mut h2h, &[]).unwrap();
        let forward = result[0].selector();
        assert_eq!(forward.criterion(CriterionType::TcpSrc), Some(&Criterion::TcpSrc(40000)));
        assert_eq!(forward.criterion(CriterionType::TcpDst), Some(&Criterion::TcpDst(80)));

        let reverse = result[1].selector();
        assert_eq!(reverse.criterion(CriterionType::TcpSrc), Some(&Criterion::TcpSrc(80)));
        assert_eq!(reverse.criterion(CriterionType::TcpDst), Some(&Criterion::TcpDst(40000)));
    }

    #[test]
    fn test_udp_destination_only_moves_to_source() {
        let selector = TrafficSelector::builder()
            .match_ip_protocol(IP_PROTO_UDP)
            .match_udp_dst(53)
            .build();
        let inverted = invert_transport_ports(selector);
        assert_eq!(inverted.criterion(CriterionType::UdpSrc), Some(&Criterion::UdpSrc(53)));
        assert!(inverted.criterion(CriterionType::UdpDst).is_none());

        // no protocol match, no inversion
        let bare = TrafficSelector::builder().match_tcp_dst(80).build();
        assert_eq!(invert_transport_ports(bare.clone()), bare);
    }

    #[test]
    fn test_bandwidth_compile_is_idempotent() {
        let fixture = fixture(CompilerConfig::default());
        let mut h2h = intent()
            .constraint(Constraint::bandwidth(Bandwidth::mbps(10.0)))
            .build()
            .unwrap();

        fixture.compiler.compile(&mut h2h, &[]).unwrap();
        let first = fixture.resources.all_allocations();
        // s1/3, s1/1, s3/1 and s3/3; the reverse direction reuses them
        assert_eq!(first.len(), 4);
        assert!(first
            .iter()
            .all(|a| a.resource.value == Bandwidth::mbps(10.0).as_bps()));

        fixture.compiler.compile(&mut h2h, &[]).unwrap();
        assert_eq!(fixture.resources.all_allocations(), first);

        fixture.compiler.withdraw(&mut h2h).unwrap();
        assert!(fixture.resources.all_allocations().is_empty());
    }

    #[test]
    fn test_annotations_follow_compile_and_withdraw() {
        let fixture = fixture(CompilerConfig::default());
        let mut h2h = intent()
            .constraint(Constraint::advanced_annotation("latency", 20.0, true))
            .build()
            .unwrap();
        let s1 = || ConnectPoint::device("s1", 1);
        let s3 = || ConnectPoint::device("s3", 1);

        fixture.compiler.compile(&mut h2h, &[]).unwrap();
        assert_eq!(latency(&fixture.links, s1(), s3()), "30");
        assert_eq!(latency(&fixture.links, s3(), s1()), "30");

        // recompiling removes the old contribution before adding the new one
        fixture.compiler.compile(&mut h2h, &[]).unwrap();
        assert_eq!(latency(&fixture.links, s1(), s3()), "30");

        fixture.compiler.withdraw(&mut h2h).unwrap();
        assert_eq!(latency(&fixture.links, s1(), s3()), "10");
        assert_eq!(latency(&fixture.links, s3(), s1()), "10");
        assert!(h2h.paths().is_none());
    }

    #[test]
    fn test_path_not_found_leaves_no_paths() {
        let fixture = fixture(CompilerConfig::default());
        // validated against the live latency of 10
        let mut h2h = intent()
            .constraint(Constraint::advanced_annotation("latency", 5.0, true))
            .build()
            .unwrap();

        let err = fixture.compiler.compile(&mut h2h, &[]).unwrap_err();
        assert!(matches!(err, MeridianError::PathNotFound { .. }));
        assert!(h2h.paths().is_none());
        assert_eq!(
            latency(&fixture.links, ConnectPoint::device("s1", 1), ConnectPoint::device("s3", 1)),
            "10"
        );
    }

    #[test]
    fn test_unparseable_annotation_never_removes_twice() {
        let fixture = fixture(CompilerConfig::default());
        let mut h2h = intent()
            .constraint(Constraint::annotation("latency", 100.0))
            .build()
            .unwrap();
        let s1 = || ConnectPoint::device("s1", 1);
        let s3 = || ConnectPoint::device("s3", 1);
        let reverse = || fixture.links.link(&s3(), &s1()).unwrap();

        fixture.compiler.compile(&mut h2h, &[]).unwrap();
        assert_eq!(latency(&fixture.links, s1(), s3()), "110");

        fixture.links.insert(reverse().with_annotation("latency", "n/a"));
        for _ in 0..3 {
            let err = fixture.compiler.compile(&mut h2h, &[]).unwrap_err();
            assert!(matches!(err, MeridianError::InvalidAnnotation { .. }));
            assert!(h2h.paths().is_some());
            assert_eq!(latency(&fixture.links, s1(), s3()), "110");
        }

        fixture.links.insert(reverse().with_annotation("latency", "110"));
        fixture.compiler.compile(&mut h2h, &[]).unwrap();
        fixture.compiler.withdraw(&mut h2h).unwrap();
        assert_eq!(latency(&fixture.links, s1(), s3()), "10");
        assert_eq!(latency(&fixture.links, s3(), s1()), "10");
    }

    #[test]
    fn test_failed_annotation_add_leaves_no_paths() {
        let fixture = fixture(CompilerConfig::default());
        let core = fixture
            .links
            .link(&ConnectPoint::device("s1", 1), &ConnectPoint::device("s3", 1))
            .unwrap();
        fixture.links.insert(core.with_annotation("latency", "n/a"));
        let mut h2h = intent()
            .constraint(Constraint::annotation("latency", 100.0))
            .build()
            .unwrap();

        let err = fixture.compiler.compile(&mut h2h, &[]).unwrap_err();
        assert!(matches!(err, MeridianError::InvalidAnnotation { .. }));
        assert!(h2h.paths().is_none());
        assert_eq!(
            latency(&fixture.links, ConnectPoint::device("s3", 1), ConnectPoint::device("s1", 1)),
            "10"
        );
    }

    #[test]
    fn test_unknown_host_is_an_error() {
        let mut paths = FixedPaths::default();
        paths.routes.insert((one().into(), two().into()), vec![forward_path()]);
        let compiler = HostToHostCompiler::new(
            Arc::new(paths),
            Arc::new(InMemoryHostStore::new()),
            Arc::new(InMemoryLinkStore::new()),
            Arc::new(InMemoryResourceStore::new()),
        );
        let mut h2h = intent().build().unwrap();

        let err = compiler.compile(&mut h2h, &[]).unwrap_err();
        assert_eq!(err, MeridianError::HostNotFound(one()));
    }

    #[test]
    fn test_link_without_device_is_a_compilation_error() {
        let direct = Path::new(
            ProviderId::core(),
            vec![Link::new(ConnectPoint::host(one()), ConnectPoint::host(two()), LinkType::Edge)],
            1.0,
        )
        .unwrap();
        let mut paths = FixedPaths::default();
        paths.routes.insert((one().into(), two().into()), vec![direct]);
        let hosts = InMemoryHostStore::new();
        hosts.add_host(Host::new(one(), MAC_ONE.parse().unwrap()));
        hosts.add_host(Host::new(two(), MAC_TWO.parse().unwrap()));
        let compiler = HostToHostCompiler::new(
            Arc::new(paths),
            Arc::new(hosts),
            Arc::new(InMemoryLinkStore::new()),
            Arc::new(InMemoryResourceStore::new()),
        );
        let mut h2h = intent().build().unwrap();

        let err = compiler.compile(&mut h2h, &[]).unwrap_err();
        assert!(matches!(err, MeridianError::IntentCompilation(_)));
    }
}
