//! Bridge server binary
//!
//! Runs one generation (binding service plus admin API) at a time. `SIGHUP`
//! reloads the configuration and swaps generations; ctrl-c exits.

use anyhow::Context;
use binding_core::{BridgeConfig, MetricsExporter};
use bridge_server::{config, Generation};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Reload trigger; never fires off unix
struct Reload {
    #[cfg(unix)]
    signal: tokio::signal::unix::Signal,
}

impl Reload {
    fn new() -> std::io::Result<Self> {
        Ok(Self {
            #[cfg(unix)]
            signal: tokio::signal::unix::signal(tokio::signal::unix::SignalKind::hangup())?,
        })
    }

    async fn recv(&mut self) {
        #[cfg(unix)]
        self.signal.recv().await;
        #[cfg(not(unix))]
        std::future::pending::<()>().await;
    }
}

fn init_tracing(config: &BridgeConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    let json = config.log_format.eq_ignore_ascii_case("json");

    tracing_subscriber::registry()
        .with(filter)
        .with(json.then(|| fmt::layer().json()))
        .with((!json).then(|| fmt::layer()))
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let path = config::config_path(std::env::args().skip(1));
    let mut current = config::load(&path)?;
    init_tracing(&current);

    info!(config = %path, "Starting bridge server");

    let registry = Arc::new(connectors::builtin_registry());
    let exporter = Arc::new(MetricsExporter::new()?);
    let mut reload = Reload::new().context("failed to install SIGHUP handler")?;

    loop {
        let generation = Generation::start(&current, registry.clone(), exporter.clone()).await?;

        let next = loop {
            tokio::select! {
                _ = reload.recv() => {
                    info!(config = %path, "Reloading configuration");
                    match config::load(&path) {
                        Ok(next) => break Some(next),
                        Err(e) => error!(error = %format!("{:#}", e), "Reload rejected, keeping current bindings"),
                    }
                }
                result = tokio::signal::ctrl_c() => {
                    if let Err(e) = result {
                        error!(error = %e, "Failed to listen for shutdown signal");
                    }
                    break None;
                }
            }
        };

        generation.stop().await;
        match next {
            Some(next) => current = next,
            None => break,
        }
    }

    info!("Bridge server stopped");
    Ok(())
}
