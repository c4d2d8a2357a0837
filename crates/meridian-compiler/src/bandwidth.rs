//! Bandwidth reservation reconciliation.

use meridian_core::{
    ConnectPoint, ConnectivityIntent, Resource, ResourceAllocation, ResourceConsumer,
};
use meridian_state::ResourceService;
use tracing::{debug, info};

/// Diffs the bandwidth an intent needs against what its consumer holds.
pub struct BandwidthReconciler<'a> {
    resources: &'a dyn ResourceService,
}

impl<'a> BandwidthReconciler<'a> {
    pub fn new(resources: &'a dyn ResourceService) -> Self {
        Self { resources }
    }

    /// The consumer an intent's reservations are accounted against.
    pub fn consumer(intent: &ConnectivityIntent) -> ResourceConsumer {
        match intent.resource_group {
            Some(group) => ResourceConsumer::Group(group),
            None => ResourceConsumer::Intent(intent.key.clone()),
        }
    }

    /// Reserve the intent's bandwidth on every device port in `points`.
    ///
    /// Resources already held with the same value are left alone; held
    /// resources with a different value are released and re-allocated. Once
    /// the intent belongs to a resource group, allocations still held under
    /// its own key are released. Returns the allocations made by this call.
    pub fn reconcile(
        &self,
        intent: &ConnectivityIntent,
        points: &[ConnectPoint],
    ) -> Vec<ResourceAllocation> {
        let Some(bandwidth) = intent
            .constraints
            .iter()
            .find_map(|c| c.requested_bandwidth())
        else {
            return Vec::new();
        };

        let consumer = Self::consumer(intent);
        let held = self.resources.resource_allocations(&consumer);

        let mut desired: Vec<Resource> = Vec::new();
        for point in points {
            let Some(device) = point.device_id() else {
                continue;
            };
            let resource = Resource::bandwidth(device.clone(), point.port, bandwidth);
            if !desired.iter().any(|r| r.id == resource.id) {
                desired.push(resource);
            }
        }

        let pending: Vec<Resource> = desired
            .into_iter()
            .filter(|r| !held.iter().any(|a| &a.resource == r))
            .collect();
        if pending.is_empty() {
            debug!("{} already holds the requested bandwidth", consumer);
            return Vec::new();
        }

        let outdated: Vec<ResourceAllocation> = held
            .into_iter()
            .filter(|a| pending.iter().any(|r| r.id == a.resource.id))
            .collect();
        if !outdated.is_empty() {
            debug!("Releasing {} outdated allocation(s) of {}", outdated.len(), consumer);
            if !self.resources.release(&outdated) {
                debug!("Some outdated allocation(s) of {} were not held", consumer);
            }
        }

        if intent.resource_group.is_some() {
            let legacy = self
                .resources
                .resource_allocations(&ResourceConsumer::Intent(intent.key.clone()));
            if !legacy.is_empty() {
                debug!(
                    "Moving {} allocation(s) of intent {} to {}",
                    legacy.len(),
                    intent.key,
                    consumer
                );
                if !self.resources.release(&legacy) {
                    debug!("Some allocation(s) of intent {} were not held", intent.key);
                }
            }
        }

        let requested = pending.len();
        let allocations = self.resources.allocate(&consumer, pending);
        if allocations.is_empty() {
            info!(
                "Unable to reserve {} bandwidth resource(s) for {}; continuing without",
                requested, consumer
            );
        } else {
            debug!("Reserved {} bandwidth resource(s) for {}", allocations.len(), consumer);
        }
        allocations
    }
}
