//! Constraint-filtered, flow-sticky path selection.
//!
//! Candidates come from a [`PathService`] queried with a
//! [`ConstraintWeigher`]. Every surviving candidate passes full-path
//! validation for all of the intent's constraints; the pick among survivors
//! is driven by a fingerprint of the intent's 5-tuple, so the same flow maps
//! to the same path while the candidate set is unchanged.

use meridian_core::flow::{IP_PROTO_SCTP, IP_PROTO_TCP, IP_PROTO_UDP};
use meridian_core::{
    Constraint, CriterionType, DisjointPath, ElementId, FlowIntent, MeridianError, Path, Result,
    TrafficSelector,
};
use meridian_state::{HostService, LinkStore, ResourceService};
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::service::PathService;
use crate::weigher::{ConstraintContext, ConstraintWeigher};

/// Picks one path (or disjoint pair) for an intent.
pub struct PathSelector<'a> {
    paths: &'a dyn PathService,
    hosts: &'a dyn HostService,
    context: ConstraintContext<'a>,
}

impl<'a> PathSelector<'a> {
    pub fn new(
        paths: &'a dyn PathService,
        hosts: &'a dyn HostService,
        links: &'a dyn LinkStore,
        resources: &'a dyn ResourceService,
    ) -> Self {
        Self {
            paths,
            hosts,
            context: ConstraintContext::new(links, resources),
        }
    }

    /// Select a path from `src` to `dst` satisfying every constraint of the intent.
    pub fn select_path<I: FlowIntent + ?Sized>(
        &self,
        intent: &I,
        src: &ElementId,
        dst: &ElementId,
    ) -> Result<Path> {
        let constraints = &intent.connectivity().constraints;
        let weigher = ConstraintWeigher::new(constraints, self.context);

        let mut survivors: Vec<Path> = self
            .paths
            .paths(src, dst, &weigher)
            .into_iter()
            .filter(|path| self.satisfies(constraints, path))
            .collect();

        if survivors.is_empty() {
            debug!("No path from {} to {} satisfies {:?}", src, dst, constraints);
            return Err(MeridianError::PathNotFound {
                src: src.clone(),
                dst: dst.clone(),
            });
        }

        let index = self.pick(intent, survivors.len());
        debug!(
            "Selected path {} of {} from {} to {}",
            index,
            survivors.len(),
            src,
            dst
        );
        Ok(survivors.swap_remove(index))
    }

    /// Select a disjoint pair whose primary and backup both satisfy every constraint.
    pub fn select_disjoint_pair<I: FlowIntent + ?Sized>(
        &self,
        intent: &I,
        src: &ElementId,
        dst: &ElementId,
    ) -> Result<DisjointPath> {
        let constraints = &intent.connectivity().constraints;
        let weigher = ConstraintWeigher::new(constraints, self.context);

        let mut survivors: Vec<DisjointPath> = self
            .paths
            .disjoint_paths(src, dst, &weigher)
            .into_iter()
            .filter(|pair| {
                self.satisfies(constraints, &pair.primary) && self.satisfies(constraints, &pair.backup)
            })
            .collect();

        if survivors.is_empty() {
            debug!("No disjoint pair from {} to {} satisfies {:?}", src, dst, constraints);
            return Err(MeridianError::PathNotFound {
                src: src.clone(),
                dst: dst.clone(),
            });
        }

        let index = self.pick(intent, survivors.len());
        Ok(survivors.swap_remove(index))
    }

    /// 5-tuple fingerprint of an intent.
    ///
    /// Folds, with `acc = 31 * acc + hash`, the IP address sets of both
    /// endpoints (host-to-host intents with known hosts only), the IP
    /// protocol criterion and, for TCP, UDP and SCTP, the source and
    /// destination port criteria. Absent criteria hash to 0.
    pub fn fingerprint<I: FlowIntent + ?Sized>(&self, intent: &I) -> i32 {
        let mut acc: i32 = 0;
        let mut fold = |hash: i32| acc = acc.wrapping_mul(31).wrapping_add(hash);

        if let Some((one, two)) = intent.host_pair() {
            for id in [one, two] {
                if let Some(host) = self.hosts.host(id) {
                    let addresses: Vec<String> =
                        host.ip_addresses.iter().map(|ip| ip.to_string()).collect();
                    fold(stable_hash(addresses.join(",").as_bytes()));
                }
            }
        }

        let selector = &intent.connectivity().selector;
        fold(criterion_hash(selector, CriterionType::IpProto));

        if let Some(protocol) = selector.ip_protocol() {
            if matches!(protocol, IP_PROTO_TCP | IP_PROTO_UDP | IP_PROTO_SCTP) {
                for port in [
                    CriterionType::transport_src(protocol),
                    CriterionType::transport_dst(protocol),
                ]
                .into_iter()
                .flatten()
                {
                    fold(criterion_hash(selector, port));
                }
            }
        }

        acc
    }

    fn pick<I: FlowIntent + ?Sized>(&self, intent: &I, count: usize) -> usize {
        (self.fingerprint(intent) as i64).rem_euclid(count as i64) as usize
    }

    fn satisfies(&self, constraints: &[Constraint], path: &Path) -> bool {
        constraints.iter().all(|c| c.validate(path, &self.context))
    }
}

/// Process-independent 32-bit hash.
pub fn stable_hash(bytes: &[u8]) -> i32 {
    let digest = Sha256::digest(bytes);
    i32::from_be_bytes([digest[0], digest[1], digest[2], digest[3]])
}

fn criterion_hash(selector: &TrafficSelector, criterion_type: CriterionType) -> i32 {
    selector
        .criterion(criterion_type)
        .map(|c| stable_hash(c.to_string().as_bytes()))
        .unwrap_or(0)
}
