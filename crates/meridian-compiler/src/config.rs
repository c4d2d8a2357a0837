//! Compiler configuration.

use meridian_core::ProviderId;
use serde::{Deserialize, Serialize};

/// Kind of installable intent produced per direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubIntentFlavor {
    /// Explicit link set with filtered ingress/egress points; treatment applied on egress.
    #[default]
    LinkCollection,
    /// Direct path reference; the selector also matches the destination MAC.
    Path,
}

/// Configuration for the host-to-host compiler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompilerConfig {
    /// Write attempts per link before an annotation update is given up as stale.
    pub annotation_write_attempts: usize,

    /// Provider identity used when writing annotations back to the link store.
    pub annotation_provider: ProviderId,

    /// Installable intent flavor.
    pub sub_intent_flavor: SubIntentFlavor,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            annotation_write_attempts: 10,
            annotation_provider: ProviderId::new("h2h", "intentCompiler"),
            sub_intent_flavor: SubIntentFlavor::LinkCollection,
        }
    }
}
