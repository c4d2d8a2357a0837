//! Node settings from the environment.

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::Context;
use meridian_compiler::CompilerConfig;
use meridian_planner::PlannerConfig;
use serde::{Deserialize, Serialize};

const DEFAULT_ADDR: &str = "0.0.0.0:3000";

/// Contents of the optional `MERIDIAN_CONFIG` file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    pub compiler: CompilerConfig,
    pub planner: PlannerConfig,
}

/// Everything the node needs to start.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Listen address (`MERIDIAN_ADDR`).
    pub addr: SocketAddr,

    /// Topology file to preload (`MERIDIAN_TOPOLOGY`).
    pub topology: Option<PathBuf>,

    pub config: NodeConfig,
}

impl Settings {
    /// Read settings from `MERIDIAN_ADDR`, `MERIDIAN_TOPOLOGY` and `MERIDIAN_CONFIG`.
    pub fn from_env() -> anyhow::Result<Self> {
        let addr = std::env::var("MERIDIAN_ADDR").unwrap_or_else(|_| DEFAULT_ADDR.to_string());
        let addr = addr
            .parse()
            .with_context(|| format!("invalid MERIDIAN_ADDR {addr:?}"))?;

        let topology = std::env::var_os("MERIDIAN_TOPOLOGY").map(PathBuf::from);

        let config = match std::env::var_os("MERIDIAN_CONFIG") {
            Some(path) => {
                let path = PathBuf::from(path);
                let raw = std::fs::read_to_string(&path)
                    .with_context(|| format!("reading config {}", path.display()))?;
                serde_json::from_str(&raw)
                    .with_context(|| format!("parsing config {}", path.display()))?
            }
            None => NodeConfig::default(),
        };

        Ok(Self {
            addr,
            topology,
            config,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meridian_compiler::SubIntentFlavor;

    #[test]
    fn test_node_config_defaults() {
        let config: NodeConfig =
            serde_json::from_str(r#"{ "compiler": { "sub_intent_flavor": "path" } }"#).unwrap();
        assert_eq!(config.compiler.sub_intent_flavor, SubIntentFlavor::Path);
        assert_eq!(config.compiler.annotation_write_attempts, 10);
        assert_eq!(config.planner.max_paths, 16);
    }
}
