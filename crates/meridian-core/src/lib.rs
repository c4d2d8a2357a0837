//! # Meridian Core
//!
//! Core primitives and types for Meridian.
//!
//! This crate provides the fundamental building blocks:
//! - [`Link`], [`Path`], [`Host`] - the network model
//! - [`TrafficSelector`] / [`TrafficTreatment`] - match and action
//! - [`Constraint`] - routing rules that cost or veto links
//! - [`HostToHostIntent`] and the installable intents it compiles to
//! - [`MeridianError`] - error types

pub mod codec;
pub mod constraint;
pub mod error;
pub mod flow;
pub mod intent;
pub mod resource;
pub mod types;

// Re-exports for convenience
pub use constraint::{Constraint, ResourceContext};
pub use error::{MeridianError, Result};
pub use flow::{Criterion, CriterionType, TrafficSelector, TrafficTreatment};
pub use intent::{
    ApplicationId, ConnectivityIntent, FilteredConnectPoint, FlowIntent, HostToHostIntent,
    HostToHostIntentBuilder, Intent, IntentKey, LinkCollectionIntent, PathIntent, ResourceGroup,
};
pub use resource::{Bandwidth, Resource, ResourceAllocation, ResourceConsumer, ResourceId};
pub use types::*;

/// Prelude module for common imports
pub mod prelude {
    pub use crate::constraint::{Constraint, ResourceContext};
    pub use crate::error::{MeridianError, Result};
    pub use crate::flow::{TrafficSelector, TrafficTreatment};
    pub use crate::intent::{FlowIntent, HostToHostIntent, Intent, IntentKey};
    pub use crate::types::{ConnectPoint, ElementId, HostId, Link, LinkType, Path};
}
