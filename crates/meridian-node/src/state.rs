//! Application state.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use meridian_compiler::HostToHostCompiler;
use meridian_core::{HostToHostIntent, Intent};
use meridian_planner::TopologyPathService;
use meridian_state::{InMemoryHostStore, InMemoryLinkStore, InMemoryResourceStore};
use tokio::sync::RwLock;

use crate::config::NodeConfig;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Submitted intents, by key.
    pub intents: Arc<RwLock<HashMap<String, IntentRecord>>>,

    pub compiler: Arc<HostToHostCompiler>,

    pub links: Arc<InMemoryLinkStore>,
    pub hosts: Arc<InMemoryHostStore>,
    pub resources: Arc<InMemoryResourceStore>,
}

/// A submitted intent and the outcome of its last compilation.
#[derive(Clone)]
pub struct IntentRecord {
    pub intent: HostToHostIntent,

    /// Installable intents from the last successful compilation.
    pub installables: Vec<Intent>,

    /// Error of the last compilation, if it failed.
    pub error: Option<String>,

    pub updated_at: DateTime<Utc>,
}

impl IntentRecord {
    pub fn new(intent: HostToHostIntent) -> Self {
        Self {
            intent,
            installables: Vec::new(),
            error: None,
            updated_at: Utc::now(),
        }
    }
}

impl AppState {
    /// Create the stores, the path service and the compiler.
    pub fn new(config: NodeConfig) -> Self {
        let links = Arc::new(InMemoryLinkStore::new());
        let hosts = Arc::new(InMemoryHostStore::new());
        let resources = Arc::new(InMemoryResourceStore::new());

        let paths = Arc::new(TopologyPathService::with_config(
            links.clone(),
            hosts.clone(),
            config.planner,
        ));
        let compiler = Arc::new(HostToHostCompiler::with_config(
            paths,
            hosts.clone(),
            links.clone(),
            resources.clone(),
            config.compiler,
        ));

        Self {
            intents: Arc::new(RwLock::new(HashMap::new())),
            compiler,
            links,
            hosts,
            resources,
        }
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new(NodeConfig::default())
    }
}
