//! Constraint-driven link annotation bookkeeping.
//!
//! Annotation constraints leave a trace on the links their intent uses: an
//! upper-limit constraint adds its threshold to the matching annotation and
//! a lower-limit constraint subtracts it (never below zero). Removing the
//! intent's contribution applies the opposite adjustment.

use meridian_core::{Annotations, Constraint, Link, MeridianError, ProviderId, Result};
use meridian_state::LinkStore;
use tracing::{debug, warn};

/// Whether an intent's contribution is being added to or removed from links.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnnotationDirection {
    Add,
    Remove,
}

/// Outcome of one reconciliation pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnnotationReport {
    /// Links whose annotations were written and read back as intended.
    pub updated: usize,

    /// Links whose live annotations still differ after every write attempt.
    pub stale: Vec<Link>,
}

/// Applies annotation adjustments against the authoritative link store.
pub struct AnnotationReconciler<'a> {
    links: &'a dyn LinkStore,
    provider: &'a ProviderId,
    attempts: usize,
}

impl<'a> AnnotationReconciler<'a> {
    pub fn new(links: &'a dyn LinkStore, provider: &'a ProviderId, attempts: usize) -> Self {
        Self {
            links,
            provider,
            attempts,
        }
    }

    /// Adjust the annotations of every non-EDGE link in `links`.
    ///
    /// Links missing from the store are skipped. A failure to make a write
    /// stick is reported, not returned as an error. A non-numeric value under
    /// a constrained key is an error, raised before any link is written.
    pub fn apply(
        &self,
        constraints: &[Constraint],
        links: &[Link],
        direction: AnnotationDirection,
    ) -> Result<AnnotationReport> {
        let mut pending = Vec::new();
        for link in links.iter().filter(|link| !link.is_edge()) {
            let Some(live) = self.links.link(&link.src, &link.dst) else {
                debug!("Link {} is gone, skipping annotation update", link);
                continue;
            };

            let desired = adjusted(&live.annotations, constraints, direction)?;
            if desired != live.annotations {
                pending.push((live, desired));
            }
        }

        let mut report = AnnotationReport::default();
        for (live, desired) in pending {
            if self.write(&live, &desired) {
                report.updated += 1;
            } else {
                warn!(
                    "Annotations of link {} still differ after {} attempts",
                    live, self.attempts
                );
                report.stale.push(live);
            }
        }

        Ok(report)
    }

    /// Write `desired` until the store reads it back, up to the attempt bound.
    fn write(&self, live: &Link, desired: &Annotations) -> bool {
        for attempt in 1..=self.attempts {
            self.links
                .create_or_update_link(self.provider, live.describe(desired.clone()));

            match self.links.link(&live.src, &live.dst) {
                Some(current) if &current.annotations == desired => {
                    debug!("Annotated link {} on attempt {}", live, attempt);
                    return true;
                }
                Some(_) => debug!("Annotation write to {} raced, attempt {}", live, attempt),
                None => {
                    debug!("Link {} vanished while annotating", live);
                    return false;
                }
            }
        }
        false
    }
}

/// New annotation set for a link. For each key, the last matching
/// constraint decides, computed from the current value.
fn adjusted(
    current: &Annotations,
    constraints: &[Constraint],
    direction: AnnotationDirection,
) -> Result<Annotations> {
    let mut desired = current.clone();

    for (key, value) in current.iter() {
        let Some((_, threshold, upper_limit)) = constraints
            .iter()
            .filter_map(Constraint::annotation_limit)
            .filter(|(constrained, _, _)| *constrained == key)
            .last()
        else {
            continue;
        };

        let number: f64 = value
            .trim()
            .parse()
            .map_err(|_| MeridianError::InvalidAnnotation {
                key: key.to_string(),
                value: value.to_string(),
            })?;

        let grows = matches!(
            (direction, upper_limit),
            (AnnotationDirection::Add, true) | (AnnotationDirection::Remove, false)
        );
        let updated = if grows {
            number + threshold
        } else {
            (number - threshold).max(0.0)
        };
        desired.set(key, updated.to_string());
    }

    Ok(desired)
}
