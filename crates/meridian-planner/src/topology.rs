//! In-memory path enumeration over the link store and host directory.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BinaryHeap, HashMap, HashSet};
use std::sync::Arc;

use meridian_core::{
    ConnectPoint, DisjointPath, ElementId, Link, LinkState, LinkType, Path, ProviderId,
};
use meridian_state::{HostService, LinkStore};
use tracing::{debug, trace};

use crate::service::{PathService, PlannerConfig};
use crate::weigher::LinkWeigher;

/// Costs closer than this are treated as equal.
const COST_EPSILON: f64 = 1e-9;

/// Shortest-path enumerator over the current topology.
///
/// Active links from the link store form the infrastructure graph; every
/// host with a location is attached through a pair of EDGE links. Hosts are
/// never used as transit nodes.
pub struct TopologyPathService {
    links: Arc<dyn LinkStore>,
    hosts: Arc<dyn HostService>,
    config: PlannerConfig,
}

/// Node in the Dijkstra frontier.
#[derive(Clone)]
struct SearchNode {
    element: ElementId,
    /// Cost from the source.
    cost: f64,
}

impl PartialEq for SearchNode {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for SearchNode {}

impl Ord for SearchNode {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse ordering for min-heap (lower cost = higher priority)
        other
            .cost
            .partial_cmp(&self.cost)
            .unwrap_or(Ordering::Equal)
            .then_with(|| other.element.cmp(&self.element))
    }
}

impl PartialOrd for SearchNode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Weighed adjacency lists keyed by source element.
#[derive(Default)]
struct Graph {
    adjacency: BTreeMap<ElementId, Vec<(Link, f64)>>,
}

/// Links and transit nodes a search must avoid.
#[derive(Default)]
struct Exclusions {
    links: HashSet<(ConnectPoint, ConnectPoint)>,
    nodes: HashSet<ElementId>,
}

impl Exclusions {
    /// Everything a backup path must not share with `primary`.
    fn disjoint_from(primary: &Path) -> Self {
        let mut exclusions = Self::default();
        for link in primary.links() {
            exclusions.links.insert((link.src.clone(), link.dst.clone()));
            exclusions.links.insert((link.dst.clone(), link.src.clone()));
        }
        for link in &primary.links()[1..] {
            exclusions.nodes.insert(link.src.element_id.clone());
        }
        exclusions
    }

    fn allows(&self, link: &Link) -> bool {
        !self.links.contains(&(link.src.clone(), link.dst.clone()))
            && !self.nodes.contains(&link.src.element_id)
            && !self.nodes.contains(&link.dst.element_id)
    }
}

impl TopologyPathService {
    /// Create a path service with default configuration.
    pub fn new(links: Arc<dyn LinkStore>, hosts: Arc<dyn HostService>) -> Self {
        Self::with_config(links, hosts, PlannerConfig::default())
    }

    /// Create a path service with custom configuration.
    pub fn with_config(
        links: Arc<dyn LinkStore>,
        hosts: Arc<dyn HostService>,
        config: PlannerConfig,
    ) -> Self {
        Self {
            links,
            hosts,
            config,
        }
    }

    fn graph(&self, weigher: &dyn LinkWeigher, exclusions: &Exclusions) -> Graph {
        let mut graph = Graph::default();

        let mut candidates: Vec<Link> = self
            .links
            .links()
            .into_iter()
            .filter(|link| link.state == LinkState::Active)
            .collect();
        for host in self.hosts.hosts() {
            if let Some(location) = host.location() {
                let attach = ConnectPoint::host(host.id.clone());
                candidates.push(Link::new(attach.clone(), location.clone(), LinkType::Edge));
                candidates.push(Link::new(location.clone(), attach, LinkType::Edge));
            }
        }

        for link in candidates {
            if !exclusions.allows(&link) {
                continue;
            }
            match weigher.weight(&link).value() {
                Some(weight) => graph
                    .adjacency
                    .entry(link.src.element_id.clone())
                    .or_default()
                    .push((link, weight)),
                None => trace!("Skipping non-viable link {}", link),
            }
        }

        for edges in graph.adjacency.values_mut() {
            edges.sort_by(|a, b| a.0.cmp(&b.0));
        }
        graph
    }

    /// All equal-cost shortest paths, capped at `max_paths`, in link order.
    fn shortest_paths(&self, graph: &Graph, src: &ElementId, dst: &ElementId) -> Vec<Path> {
        if src == dst {
            return Vec::new();
        }

        let mut dist: HashMap<ElementId, f64> = HashMap::new();
        let mut preds: HashMap<ElementId, Vec<Link>> = HashMap::new();
        let mut settled: HashSet<ElementId> = HashSet::new();
        let mut frontier = BinaryHeap::new();

        dist.insert(src.clone(), 0.0);
        frontier.push(SearchNode {
            element: src.clone(),
            cost: 0.0,
        });

        while let Some(SearchNode { element, cost }) = frontier.pop() {
            if !settled.insert(element.clone()) {
                continue;
            }
            // hosts only originate or terminate paths
            if !element.is_device() && &element != src {
                continue;
            }

            for (link, weight) in graph.adjacency.get(&element).into_iter().flatten() {
                let next = &link.dst.element_id;
                let candidate = cost + weight;
                match dist.get(next) {
                    Some(&known) if candidate > known + COST_EPSILON => {}
                    Some(&known) if (candidate - known).abs() <= COST_EPSILON => {
                        preds.entry(next.clone()).or_default().push(link.clone());
                    }
                    _ => {
                        dist.insert(next.clone(), candidate);
                        preds.insert(next.clone(), vec![link.clone()]);
                        frontier.push(SearchNode {
                            element: next.clone(),
                            cost: candidate,
                        });
                    }
                }
            }
        }

        let Some(&cost) = dist.get(dst) else {
            debug!("{} is unreachable from {}", dst, src);
            return Vec::new();
        };

        let mut routes = Vec::new();
        let mut on_route = HashSet::from([dst.clone()]);
        self.unwind(dst, src, &preds, &mut Vec::new(), &mut on_route, &mut routes);
        routes.sort();

        routes
            .into_iter()
            .filter_map(|links| Path::new(ProviderId::core(), links, cost).ok())
            .collect()
    }

    /// Walk predecessor links back from `node` to `src`, collecting routes.
    fn unwind(
        &self,
        node: &ElementId,
        src: &ElementId,
        preds: &HashMap<ElementId, Vec<Link>>,
        suffix: &mut Vec<Link>,
        on_route: &mut HashSet<ElementId>,
        routes: &mut Vec<Vec<Link>>,
    ) {
        if routes.len() >= self.config.max_paths {
            return;
        }
        if node == src {
            routes.push(suffix.iter().rev().cloned().collect());
            return;
        }
        for link in preds.get(node).into_iter().flatten() {
            let previous = &link.src.element_id;
            if !on_route.insert(previous.clone()) {
                continue;
            }
            suffix.push(link.clone());
            self.unwind(previous, src, preds, suffix, on_route, routes);
            suffix.pop();
            on_route.remove(previous);
        }
    }
}

impl PathService for TopologyPathService {
    fn paths(&self, src: &ElementId, dst: &ElementId, weigher: &dyn LinkWeigher) -> Vec<Path> {
        let graph = self.graph(weigher, &Exclusions::default());
        let paths = self.shortest_paths(&graph, src, dst);
        debug!("Found {} candidate path(s) from {} to {}", paths.len(), src, dst);
        paths
    }

    fn disjoint_paths(
        &self,
        src: &ElementId,
        dst: &ElementId,
        weigher: &dyn LinkWeigher,
    ) -> Vec<DisjointPath> {
        let pairs: Vec<DisjointPath> = self
            .paths(src, dst, weigher)
            .into_iter()
            .filter_map(|primary| {
                let graph = self.graph(weigher, &Exclusions::disjoint_from(&primary));
                let backup = self.shortest_paths(&graph, src, dst).into_iter().next()?;
                Some(DisjointPath { primary, backup })
            })
            .collect();
        debug!("Found {} disjoint pair(s) from {} to {}", pairs.len(), src, dst);
        pairs
    }
}
