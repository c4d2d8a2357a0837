//! Path enumeration trait and configuration.

use meridian_core::{DisjointPath, ElementId, Path};
use serde::{Deserialize, Serialize};

use crate::weigher::LinkWeigher;

/// Configuration for path enumeration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerConfig {
    /// Maximum number of equal-cost paths enumerated per query.
    pub max_paths: usize,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self { max_paths: 16 }
    }
}

/// Trait for path enumeration services.
pub trait PathService: Send + Sync {
    /// Candidate paths from `src` to `dst`, weighed by `weigher`.
    fn paths(&self, src: &ElementId, dst: &ElementId, weigher: &dyn LinkWeigher) -> Vec<Path>;

    /// Candidate pairs of link- and node-disjoint paths from `src` to `dst`.
    fn disjoint_paths(
        &self,
        src: &ElementId,
        dst: &ElementId,
        weigher: &dyn LinkWeigher,
    ) -> Vec<DisjointPath>;
}
