//! Continuous resource ledger.

use std::collections::HashMap;

use meridian_core::{Resource, ResourceAllocation, ResourceConsumer, ResourceId};
use parking_lot::RwLock;

/// Trait for resource ledgers.
pub trait ResourceService: Send + Sync {
    /// Allocations currently held by a consumer.
    fn resource_allocations(&self, consumer: &ResourceConsumer) -> Vec<ResourceAllocation>;

    /// Allocate resources to a consumer.
    ///
    /// All-or-nothing: returns the new allocations, or an empty list when any
    /// resource cannot be satisfied.
    fn allocate(&self, consumer: &ResourceConsumer, resources: Vec<Resource>)
        -> Vec<ResourceAllocation>;

    /// Release allocations. Returns false if any of them was not held.
    fn release(&self, allocations: &[ResourceAllocation]) -> bool;

    /// Whether the requested quantity could still be allocated.
    fn is_available(&self, resource: &Resource) -> bool;
}

#[derive(Default)]
struct Ledger {
    capacities: HashMap<ResourceId, f64>,
    allocations: HashMap<ResourceConsumer, Vec<ResourceAllocation>>,
}

impl Ledger {
    fn allocated(&self, id: &ResourceId) -> f64 {
        self.allocations
            .values()
            .flatten()
            .filter(|a| &a.resource.id == id)
            .map(|a| a.resource.value)
            .sum()
    }

    fn fits(&self, id: &ResourceId, extra: f64) -> bool {
        match self.capacities.get(id) {
            Some(capacity) => self.allocated(id) + extra <= *capacity,
            None => true,
        }
    }
}

/// In-memory implementation of ResourceService.
///
/// Resources with no registered capacity are treated as unlimited.
#[derive(Default)]
pub struct InMemoryResourceStore {
    ledger: RwLock<Ledger>,
}

impl InMemoryResourceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the total capacity of a resource.
    pub fn register_capacity(&self, id: ResourceId, capacity: f64) {
        self.ledger.write().capacities.insert(id, capacity);
    }

    /// Every allocation in the ledger.
    pub fn all_allocations(&self) -> Vec<ResourceAllocation> {
        self.ledger
            .read()
            .allocations
            .values()
            .flatten()
            .cloned()
            .collect()
    }
}

impl ResourceService for InMemoryResourceStore {
    fn resource_allocations(&self, consumer: &ResourceConsumer) -> Vec<ResourceAllocation> {
        self.ledger
            .read()
            .allocations
            .get(consumer)
            .cloned()
            .unwrap_or_default()
    }

    fn allocate(
        &self,
        consumer: &ResourceConsumer,
        resources: Vec<Resource>,
    ) -> Vec<ResourceAllocation> {
        let mut ledger = self.ledger.write();

        let mut requested: HashMap<&ResourceId, f64> = HashMap::new();
        for resource in &resources {
            *requested.entry(&resource.id).or_default() += resource.value;
        }
        if let Some((id, _)) = requested.iter().find(|(id, extra)| !ledger.fits(id, **extra)) {
            tracing::debug!("Not enough {} left for {}", id, consumer);
            return Vec::new();
        }

        let allocations: Vec<ResourceAllocation> = resources
            .into_iter()
            .map(|resource| ResourceAllocation::new(resource, consumer.clone()))
            .collect();
        ledger
            .allocations
            .entry(consumer.clone())
            .or_default()
            .extend(allocations.iter().cloned());
        allocations
    }

    fn release(&self, allocations: &[ResourceAllocation]) -> bool {
        let mut ledger = self.ledger.write();
        let mut all_held = true;

        for allocation in allocations {
            let held = ledger
                .allocations
                .get_mut(&allocation.consumer)
                .and_then(|held| {
                    held.iter()
                        .position(|a| a == allocation)
                        .map(|index| held.remove(index))
                });
            if held.is_none() {
                all_held = false;
            }
        }
        ledger.allocations.retain(|_, held| !held.is_empty());
        all_held
    }

    fn is_available(&self, resource: &Resource) -> bool {
        self.ledger.read().fits(&resource.id, resource.value)
    }
}
