//! # Meridian State
//!
//! Collaborator interfaces the compiler consumes: the authoritative link
//! store, the host directory and the resource ledger, each with an
//! in-memory implementation.

pub mod host;
pub mod link;
pub mod resource;

pub use host::{HostService, InMemoryHostStore};
pub use link::{InMemoryLinkStore, LinkEvent, LinkEventKind, LinkStore};
pub use resource::{InMemoryResourceStore, ResourceService};
