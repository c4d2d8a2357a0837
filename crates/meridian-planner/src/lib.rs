//! # Meridian Planner
//!
//! Constraint-based link weighing and deterministic path selection.

pub mod selector;
pub mod service;
pub mod topology;
pub mod weigher;

pub use selector::{stable_hash, PathSelector};
pub use service::{PathService, PlannerConfig};
pub use topology::TopologyPathService;
pub use weigher::{
    ConstraintContext, ConstraintWeigher, HopCountWeigher, LinkWeigher, Weight, DEFAULT_HOP_WEIGHT,
};
