#![allow(clippy::must_use_candidate)]

pub mod cors;
mod env;
pub mod format;
pub mod generation;
mod loader;
pub mod server;
pub mod telemetry;

use serde::Deserialize;

pub use cors::*;
pub use format::OutputFormat;
pub use generation::*;
pub use server::*;
pub use telemetry::{ExportProtocol, ExporterConfig, TelemetryConfig};

/// Top-level SonicForge configuration
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// HTTP front door configuration
    #[serde(default)]
    pub server: ServerConfig,
    /// Providers, models and transcoding
    #[serde(default)]
    pub generation: GenerationConfig,
    /// Telemetry configuration
    #[serde(default)]
    pub telemetry: Option<TelemetryConfig>,
}
