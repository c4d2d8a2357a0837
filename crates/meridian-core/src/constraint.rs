//! Routing constraints.
//!
//! A [`Constraint`] can veto or cost an individual link and validate a
//! whole path. Costs are non-negative; a negative cost means the link is
//! forbidden.

use serde::{Deserialize, Serialize};

use crate::resource::{Bandwidth, Resource};
use crate::types::{ConnectPoint, Link, LinkState, LinkType, Path};

/// Cost reported for a link a constraint rejects.
pub const VETO: f64 = -1.0;

/// Read-only view of external state that constraints may consult.
pub trait ResourceContext {
    /// Whether the requested quantity of a resource can still be allocated.
    fn is_available(&self, resource: &Resource) -> bool;

    /// The authoritative copy of a link, if the context has access to a link store.
    fn live_link(&self, _src: &ConnectPoint, _dst: &ConnectPoint) -> Option<Link> {
        None
    }
}

/// A rule that vetoes or costs candidate links and paths.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Constraint {
    /// Every device port on the path must have this much bandwidth available.
    Bandwidth { bandwidth: Bandwidth },

    /// The numeric annotation `key` must stay at or below `threshold`.
    Annotation { key: String, threshold: f64 },

    /// The numeric annotation `key` must stay at or below (`upper_limit`)
    /// or at or above the threshold.
    AdvancedAnnotation {
        key: String,
        threshold: f64,
        upper_limit: bool,
    },

    /// Compute the two directions independently instead of inverting.
    AsymmetricPath,

    /// Links must (`inclusive`) or must not be of one of `types`.
    LinkType { inclusive: bool, types: Vec<LinkType> },

    /// Advisory tag for other components; never vetoes or costs.
    Marker { name: String },

    /// Every link on the path must be active.
    PathViability,
}

impl Constraint {
    /// The default constraint excluding optical links.
    pub fn not_optical() -> Self {
        Constraint::LinkType {
            inclusive: false,
            types: vec![LinkType::Optical],
        }
    }

    pub fn annotation(key: impl Into<String>, threshold: f64) -> Self {
        Constraint::Annotation {
            key: key.into(),
            threshold,
        }
    }

    pub fn advanced_annotation(key: impl Into<String>, threshold: f64, upper_limit: bool) -> Self {
        Constraint::AdvancedAnnotation {
            key: key.into(),
            threshold,
            upper_limit,
        }
    }

    pub fn bandwidth(bandwidth: Bandwidth) -> Self {
        Constraint::Bandwidth { bandwidth }
    }

    /// Whether this constraint takes part in link weighing.
    pub fn is_cost_bearing(&self) -> bool {
        !matches!(self, Constraint::Marker { .. } | Constraint::PathViability)
    }

    /// `(key, threshold, is_upper_limit)` for annotation constraints.
    /// A plain annotation constraint is an upper limit.
    pub fn annotation_limit(&self) -> Option<(&str, f64, bool)> {
        match self {
            Constraint::Annotation { key, threshold } => Some((key, *threshold, true)),
            Constraint::AdvancedAnnotation {
                key,
                threshold,
                upper_limit,
            } => Some((key, *threshold, *upper_limit)),
            _ => None,
        }
    }

    /// Requested bandwidth for bandwidth constraints.
    pub fn requested_bandwidth(&self) -> Option<Bandwidth> {
        match self {
            Constraint::Bandwidth { bandwidth } => Some(*bandwidth),
            _ => None,
        }
    }

    /// Whether a single link satisfies the constraint.
    pub fn is_valid(&self, link: &Link, context: &dyn ResourceContext) -> bool {
        match self {
            Constraint::Bandwidth { bandwidth } => [&link.src, &link.dst]
                .into_iter()
                .filter_map(|cp| cp.device_id().map(|device| (device, cp.port)))
                .all(|(device, port)| {
                    context.is_available(&Resource::bandwidth(device.clone(), port, *bandwidth))
                }),
            Constraint::Annotation { key, threshold } => {
                link.annotations.numeric(key) <= *threshold
            }
            Constraint::AdvancedAnnotation { .. } => {
                match context.live_link(&link.src, &link.dst) {
                    Some(live) => self.within_limit(&live),
                    None => self.within_limit(link),
                }
            }
            Constraint::AsymmetricPath | Constraint::Marker { .. } => true,
            Constraint::LinkType { inclusive, types } => {
                types.contains(&link.link_type) == *inclusive
            }
            Constraint::PathViability => link.state == LinkState::Active,
        }
    }

    /// Whether every link of a path satisfies the constraint.
    pub fn validate(&self, path: &Path, context: &dyn ResourceContext) -> bool {
        path.links().iter().all(|link| self.is_valid(link, context))
    }

    /// Cost of traversing a link; [`VETO`] when the link is forbidden.
    pub fn cost(&self, link: &Link, context: &dyn ResourceContext) -> f64 {
        match self {
            Constraint::Annotation { key, .. } => {
                if self.is_valid(link, context) {
                    link.annotations.numeric(key)
                } else {
                    VETO
                }
            }
            // Costs the given link; only validation consults the live copy.
            Constraint::AdvancedAnnotation {
                key, upper_limit, ..
            } => {
                if !self.within_limit(link) {
                    VETO
                } else if link.is_edge() {
                    1.0
                } else if *upper_limit {
                    link.annotations.numeric(key)
                } else {
                    1.0 / link.annotations.numeric(key)
                }
            }
            Constraint::Marker { .. } => 0.0,
            _ => {
                if self.is_valid(link, context) {
                    1.0
                } else {
                    VETO
                }
            }
        }
    }

    fn within_limit(&self, link: &Link) -> bool {
        match self {
            Constraint::AdvancedAnnotation {
                key,
                threshold,
                upper_limit,
            } => {
                if link.is_edge() {
                    return true;
                }
                let value = link.annotations.numeric(key);
                if *upper_limit {
                    value <= *threshold
                } else {
                    value >= *threshold
                }
            }
            _ => true,
        }
    }
}
