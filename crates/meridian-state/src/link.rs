//! Authoritative link store.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use meridian_core::{ConnectPoint, Link, LinkDescription, LinkState, ProviderId};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// Type of link change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkEventKind {
    Added,
    Updated,
    Removed,
}

/// A link change reported by the store.
///
/// The store only returns events; it never dispatches them, so writes made
/// through it do not trigger topology-change recompilation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkEvent {
    pub kind: LinkEventKind,
    pub link: Link,
    pub timestamp: DateTime<Utc>,
}

impl LinkEvent {
    fn new(kind: LinkEventKind, link: Link) -> Self {
        Self {
            kind,
            link,
            timestamp: Utc::now(),
        }
    }
}

/// Trait for link stores.
pub trait LinkStore: Send + Sync {
    /// Get the live link between two connect points.
    fn link(&self, src: &ConnectPoint, dst: &ConnectPoint) -> Option<Link>;

    /// Get all live links.
    fn links(&self) -> Vec<Link>;

    /// Create a link or update its description. Returns `None` when nothing changed.
    fn create_or_update_link(
        &self,
        provider_id: &ProviderId,
        description: LinkDescription,
    ) -> Option<LinkEvent>;

    /// Remove a link.
    fn remove_link(&self, src: &ConnectPoint, dst: &ConnectPoint) -> Option<LinkEvent>;
}

/// In-memory implementation of LinkStore.
pub struct InMemoryLinkStore {
    links: RwLock<HashMap<(ConnectPoint, ConnectPoint), Link>>,
}

impl InMemoryLinkStore {
    /// Create an empty link store.
    pub fn new() -> Self {
        Self {
            links: RwLock::new(HashMap::new()),
        }
    }

    /// Insert or replace a link as-is.
    pub fn insert(&self, link: Link) {
        self.links
            .write()
            .insert((link.src.clone(), link.dst.clone()), link);
    }

    /// Number of links in the store.
    pub fn len(&self) -> usize {
        self.links.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.read().is_empty()
    }
}

impl Default for InMemoryLinkStore {
    fn default() -> Self {
        Self::new()
    }
}

impl LinkStore for InMemoryLinkStore {
    fn link(&self, src: &ConnectPoint, dst: &ConnectPoint) -> Option<Link> {
        self.links.read().get(&(src.clone(), dst.clone())).cloned()
    }

    fn links(&self) -> Vec<Link> {
        let mut links: Vec<Link> = self.links.read().values().cloned().collect();
        links.sort_by(|a, b| (&a.src, &a.dst).cmp(&(&b.src, &b.dst)));
        links
    }

    fn create_or_update_link(
        &self,
        provider_id: &ProviderId,
        description: LinkDescription,
    ) -> Option<LinkEvent> {
        let mut links = self.links.write();
        let key = (description.src.clone(), description.dst.clone());

        match links.get_mut(&key) {
            Some(existing) => {
                if existing.link_type == description.link_type
                    && existing.expected == description.expected
                    && existing.annotations == description.annotations
                {
                    return None;
                }
                existing.link_type = description.link_type;
                existing.expected = description.expected;
                existing.annotations = description.annotations;
                existing.provider_id = provider_id.clone();
                tracing::debug!("Updated link {} from provider {}", existing, provider_id);
                Some(LinkEvent::new(LinkEventKind::Updated, existing.clone()))
            }
            None => {
                let link = Link {
                    provider_id: provider_id.clone(),
                    src: description.src,
                    dst: description.dst,
                    link_type: description.link_type,
                    state: LinkState::Active,
                    expected: description.expected,
                    annotations: description.annotations,
                };
                links.insert(key, link.clone());
                tracing::debug!("Added link {} from provider {}", link, provider_id);
                Some(LinkEvent::new(LinkEventKind::Added, link))
            }
        }
    }

    fn remove_link(&self, src: &ConnectPoint, dst: &ConnectPoint) -> Option<LinkEvent> {
        self.links
            .write()
            .remove(&(src.clone(), dst.clone()))
            .map(|link| LinkEvent::new(LinkEventKind::Removed, link))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meridian_core::{Annotations, LinkType};

    fn s1_s2() -> Link {
        Link::new(
            ConnectPoint::device("s1", 1),
            ConnectPoint::device("s2", 1),
            LinkType::Direct,
        )
        .with_annotation("latency", "10")
    }

    #[test]
    fn test_insert_and_get() {
        let store = InMemoryLinkStore::new();
        store.insert(s1_s2());

        let link = store.link(&ConnectPoint::device("s1", 1), &ConnectPoint::device("s2", 1));
        assert_eq!(link.unwrap().annotations.value("latency"), Some("10"));
        assert!(store
            .link(&ConnectPoint::device("s2", 1), &ConnectPoint::device("s1", 1))
            .is_none());
    }

    #[test]
    fn test_update_annotations() {
        let store = InMemoryLinkStore::new();
        store.insert(s1_s2());
        let provider = ProviderId::new("h2h", "intentCompiler");

        let annotations: Annotations = [("latency", "15")].into_iter().collect();
        let event = store
            .create_or_update_link(&provider, s1_s2().describe(annotations.clone()))
            .unwrap();
        assert_eq!(event.kind, LinkEventKind::Updated);
        assert_eq!(event.link.provider_id, provider);

        // same description again is a no-op
        assert!(store
            .create_or_update_link(&provider, s1_s2().describe(annotations))
            .is_none());
    }

    #[test]
    fn test_create_and_remove() {
        let store = InMemoryLinkStore::new();
        let event = store
            .create_or_update_link(&ProviderId::core(), s1_s2().describe(Annotations::new()))
            .unwrap();
        assert_eq!(event.kind, LinkEventKind::Added);
        assert_eq!(store.len(), 1);

        let removed = store
            .remove_link(&ConnectPoint::device("s1", 1), &ConnectPoint::device("s2", 1))
            .unwrap();
        assert_eq!(removed.kind, LinkEventKind::Removed);
        assert!(store.is_empty());
    }
}
