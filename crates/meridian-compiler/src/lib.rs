//! # Meridian Compiler
//!
//! Turns host-to-host intents into directional installable intents while
//! keeping link annotations and bandwidth reservations in step with the
//! paths in use.

pub mod annotation;
pub mod bandwidth;
pub mod config;
pub mod host_to_host;

pub use annotation::{AnnotationDirection, AnnotationReconciler, AnnotationReport};
pub use bandwidth::BandwidthReconciler;
pub use config::{CompilerConfig, SubIntentFlavor};
pub use host_to_host::{HostToHostCompiler, IntentCompiler};
