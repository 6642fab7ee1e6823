use std::path::PathBuf;

use clap::Parser;

/// SonicForge text-to-audio relay
#[derive(Debug, Parser)]
#[command(name = "sonicforge", about = "Relay text prompts to music generation providers")]
pub struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "sonicforge.toml", env = "SONICFORGE_CONFIG")]
    pub config: PathBuf,

    /// Override the listen address
    #[arg(long, env = "SONICFORGE_LISTEN")]
    pub listen: Option<std::net::SocketAddr>,

    /// Log filter in `EnvFilter` syntax
    #[arg(long, default_value = "info", env = "SONICFORGE_LOG")]
    pub log_filter: String,
}
