//! Link weighing.

use std::fmt;

use meridian_core::{ConnectPoint, Constraint, Link, Resource, ResourceContext};
use meridian_state::{LinkStore, ResourceService};

/// Weight of a single hop when no constraint applies.
pub const DEFAULT_HOP_WEIGHT: f64 = 1.0;

/// Cost of traversing a link during path search.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Weight {
    Scalar(f64),
    /// The link must not be used.
    NonViable,
}

impl Weight {
    pub fn is_viable(&self) -> bool {
        matches!(self, Weight::Scalar(_))
    }

    pub fn value(&self) -> Option<f64> {
        match self {
            Weight::Scalar(value) => Some(*value),
            Weight::NonViable => None,
        }
    }
}

impl fmt::Display for Weight {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Weight::Scalar(value) => write!(f, "{value}"),
            Weight::NonViable => f.write_str("non-viable"),
        }
    }
}

/// Edge-cost function handed to a path service.
pub trait LinkWeigher {
    fn weight(&self, link: &Link) -> Weight;
}

/// Weighs every link as one hop.
#[derive(Debug, Clone, Copy, Default)]
pub struct HopCountWeigher;

impl LinkWeigher for HopCountWeigher {
    fn weight(&self, _link: &Link) -> Weight {
        Weight::Scalar(DEFAULT_HOP_WEIGHT)
    }
}

/// The state constraints consult: resource availability and live links.
#[derive(Clone, Copy)]
pub struct ConstraintContext<'a> {
    links: &'a dyn LinkStore,
    resources: &'a dyn ResourceService,
}

impl<'a> ConstraintContext<'a> {
    pub fn new(links: &'a dyn LinkStore, resources: &'a dyn ResourceService) -> Self {
        Self { links, resources }
    }
}

impl ResourceContext for ConstraintContext<'_> {
    fn is_available(&self, resource: &Resource) -> bool {
        self.resources.is_available(resource)
    }

    fn live_link(&self, src: &ConnectPoint, dst: &ConnectPoint) -> Option<Link> {
        self.links.link(src, dst)
    }
}

/// Folds an ordered constraint list into a per-link weight.
///
/// Constraints are evaluated in declared order while the running cost stays
/// positive. The weight is the cost of the last constraint evaluated, not a
/// combination of all of them; a negative cost makes the link non-viable.
pub struct ConstraintWeigher<'a> {
    constraints: Vec<&'a Constraint>,
    context: ConstraintContext<'a>,
}

impl<'a> ConstraintWeigher<'a> {
    /// Build a weigher over the cost-bearing subset of `constraints`.
    pub fn new(constraints: &'a [Constraint], context: ConstraintContext<'a>) -> Self {
        Self {
            constraints: constraints.iter().filter(|c| c.is_cost_bearing()).collect(),
            context,
        }
    }

    /// Host-attached links and links missing from the store are costed as given.
    fn resolve(&self, link: &Link) -> Link {
        if link.is_edge() {
            return link.clone();
        }
        self.context
            .links
            .link(&link.src, &link.dst)
            .unwrap_or_else(|| link.clone())
    }
}

impl LinkWeigher for ConstraintWeigher<'_> {
    fn weight(&self, link: &Link) -> Weight {
        if self.constraints.is_empty() {
            return Weight::Scalar(DEFAULT_HOP_WEIGHT);
        }

        let live = self.resolve(link);
        let mut cost = DEFAULT_HOP_WEIGHT;
        for constraint in &self.constraints {
            if cost <= 0.0 {
                break;
            }
            cost = constraint.cost(&live, &self.context);
        }

        if cost < 0.0 {
            Weight::NonViable
        } else {
            Weight::Scalar(cost)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use meridian_core::{Bandwidth, HostId, LinkDescription, LinkType, ProviderId};
    use meridian_state::{InMemoryLinkStore, InMemoryResourceStore, LinkEvent};

    fn s1_s2(latency: &str) -> Link {
        Link::new(
            ConnectPoint::device("s1", 1),
            ConnectPoint::device("s2", 1),
            LinkType::Direct,
        )
        .with_annotation("latency", latency)
    }

    #[test]
    fn test_no_cost_bearing_constraints_is_hop_weight() {
        let links = InMemoryLinkStore::new();
        let resources = InMemoryResourceStore::new();
        let constraints = vec![
            Constraint::PathViability,
            Constraint::Marker {
                name: "protected".into(),
            },
        ];
        let weigher = ConstraintWeigher::new(&constraints, ConstraintContext::new(&links, &resources));
        assert_eq!(weigher.weight(&s1_s2("7")), Weight::Scalar(DEFAULT_HOP_WEIGHT));
    }

    #[test]
    fn test_last_evaluated_cost_wins() {
        let links = InMemoryLinkStore::new();
        let resources = InMemoryResourceStore::new();
        let constraints = vec![
            Constraint::annotation("latency", 100.0),
            Constraint::not_optical(),
        ];
        let weigher = ConstraintWeigher::new(&constraints, ConstraintContext::new(&links, &resources));
        // latency cost 7 is overwritten by the link-type cost of 1
        assert_eq!(weigher.weight(&s1_s2("7")), Weight::Scalar(1.0));

        let reversed = vec![
            Constraint::not_optical(),
            Constraint::annotation("latency", 100.0),
        ];
        let weigher = ConstraintWeigher::new(&reversed, ConstraintContext::new(&links, &resources));
        assert_eq!(weigher.weight(&s1_s2("7")), Weight::Scalar(7.0));
    }

    #[test]
    fn test_veto_stops_evaluation() {
        let links = InMemoryLinkStore::new();
        let resources = InMemoryResourceStore::new();
        let constraints = vec![
            Constraint::annotation("latency", 5.0),
            Constraint::not_optical(),
        ];
        let weigher = ConstraintWeigher::new(&constraints, ConstraintContext::new(&links, &resources));
        assert_eq!(weigher.weight(&s1_s2("7")), Weight::NonViable);
    }

    #[test]
    fn test_zero_cost_stops_evaluation() {
        let links = InMemoryLinkStore::new();
        let resources = InMemoryResourceStore::new();
        let constraints = vec![
            Constraint::annotation("latency", 5.0),
            Constraint::annotation("jitter", 0.5),
        ];
        let weigher = ConstraintWeigher::new(&constraints, ConstraintContext::new(&links, &resources));
        // latency absent costs 0, so the jitter veto is never reached
        let link = s1_s2("0").with_annotation("jitter", "9");
        assert_eq!(weigher.weight(&link), Weight::Scalar(0.0));
    }

    #[test]
    fn test_costs_against_live_link() {
        let links = InMemoryLinkStore::new();
        links.insert(s1_s2("30"));
        let resources = InMemoryResourceStore::new();
        let constraints = vec![Constraint::annotation("latency", 20.0)];
        let weigher = ConstraintWeigher::new(&constraints, ConstraintContext::new(&links, &resources));

        // the snapshot says 3 but the store says 30
        assert_eq!(weigher.weight(&s1_s2("3")), Weight::NonViable);

        let edge = Link::new(
            ConnectPoint::host(HostId::new("00:00:00:00:00:01/None")),
            ConnectPoint::device("s1", 3),
            LinkType::Edge,
        )
        .with_annotation("latency", "4");
        assert_eq!(weigher.weight(&edge), Weight::Scalar(4.0));
    }

    /// Counts point lookups.
    struct CountingLinkStore {
        inner: InMemoryLinkStore,
        lookups: AtomicUsize,
    }

    impl LinkStore for CountingLinkStore {
        fn link(&self, src: &ConnectPoint, dst: &ConnectPoint) -> Option<Link> {
            self.lookups.fetch_add(1, Ordering::SeqCst);
            self.inner.link(src, dst)
        }

        fn links(&self) -> Vec<Link> {
            self.inner.links()
        }

        fn create_or_update_link(
            &self,
            provider_id: &ProviderId,
            description: LinkDescription,
        ) -> Option<LinkEvent> {
            self.inner.create_or_update_link(provider_id, description)
        }

        fn remove_link(&self, src: &ConnectPoint, dst: &ConnectPoint) -> Option<LinkEvent> {
            self.inner.remove_link(src, dst)
        }
    }

    #[test]
    fn test_live_link_is_read_once_per_weighing() {
        let links = CountingLinkStore {
            inner: InMemoryLinkStore::new(),
            lookups: AtomicUsize::new(0),
        };
        links.inner.insert(s1_s2("30").with_annotation("jitter", "2"));
        let resources = InMemoryResourceStore::new();
        let constraints = vec![
            Constraint::not_optical(),
            Constraint::annotation("jitter", 10.0),
            Constraint::annotation("latency", 50.0),
        ];
        let weigher = ConstraintWeigher::new(&constraints, ConstraintContext::new(&links, &resources));

        assert_eq!(weigher.weight(&s1_s2("3")), Weight::Scalar(30.0));
        assert_eq!(links.lookups.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_bandwidth_consults_ledger() {
        let links = InMemoryLinkStore::new();
        let resources = InMemoryResourceStore::new();
        let link = s1_s2("1");
        resources.register_capacity(
            Resource::bandwidth(
                link.src.device_id().unwrap().clone(),
                link.src.port,
                Bandwidth::bps(0.0),
            )
            .id,
            Bandwidth::mbps(5.0).as_bps(),
        );
        let constraints = vec![Constraint::bandwidth(Bandwidth::mbps(10.0))];
        let weigher = ConstraintWeigher::new(&constraints, ConstraintContext::new(&links, &resources));
        assert!(!weigher.weight(&link).is_viable());
    }
}
