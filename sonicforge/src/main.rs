#![allow(clippy::must_use_candidate, clippy::missing_errors_doc)]

mod args;

use args::Args;
use clap::Parser;
use sonicforge_config::Config;
use sonicforge_server::Server;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = load_config(&args)?;
    let _telemetry = sonicforge_telemetry::init(config.telemetry.as_ref(), &args.log_filter)?;

    let server = Server::new(&config)?;

    tracing::info!(
        config_path = %args.config.display(),
        listen = %server.listen_address(),
        models = ?config.generation.models.keys().collect::<Vec<_>>(),
        "sonicforge ready"
    );

    let shutdown = CancellationToken::new();
    watch_signals(shutdown.clone())?;

    server.serve(shutdown).await?;

    tracing::info!("sonicforge stopped");
    Ok(())
}

/// Read the config file and apply command-line overrides
fn load_config(args: &Args) -> anyhow::Result<Config> {
    let mut config = Config::load(&args.config)?;

    if let Some(listen) = args.listen {
        config.server.listen_address = Some(listen);
    }

    Ok(config)
}

/// Cancel `shutdown` on the first SIGINT or SIGTERM
///
/// Handlers are registered before returning so a signal that arrives
/// while the listener is still binding is not lost.
#[cfg(unix)]
fn watch_signals(shutdown: CancellationToken) -> anyhow::Result<()> {
    use anyhow::Context;
    use tokio::signal::unix::{SignalKind, signal};

    let mut interrupt = signal(SignalKind::interrupt()).context("installing SIGINT handler")?;
    let mut terminate = signal(SignalKind::terminate()).context("installing SIGTERM handler")?;

    tokio::spawn(async move {
        let name = tokio::select! {
            _ = interrupt.recv() => "SIGINT",
            _ = terminate.recv() => "SIGTERM",
        };
        tracing::info!(signal = name, "draining in-flight generations");
        shutdown.cancel();
    });

    Ok(())
}

#[cfg(not(unix))]
fn watch_signals(shutdown: CancellationToken) -> anyhow::Result<()> {
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for Ctrl+C");
            return;
        }
        tracing::info!("draining in-flight generations");
        shutdown.cancel();
    });

    Ok(())
}
