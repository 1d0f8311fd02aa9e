//! One generation: a binding service plus the API serving it
//!
//! Generations never overlap. A reload stops the running generation, API
//! listener and bindings both, before the next one binds anything.

use crate::api;
use anyhow::Context;
use binding_core::{BindingService, BridgeConfig, ConnectorRegistry, MetricsExporter};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Running binding service and the API serving it
pub struct Generation {
    cancel: CancellationToken,
    service: Arc<BindingService>,
    api: JoinHandle<std::io::Result<()>>,
    api_addr: SocketAddr,
}

impl Generation {
    /// Bind the API port and launch every configured binding
    pub async fn start(
        config: &BridgeConfig,
        registry: Arc<ConnectorRegistry>,
        exporter: Arc<MetricsExporter>,
    ) -> anyhow::Result<Self> {
        let cancel = CancellationToken::new();
        let service = Arc::new(
            BindingService::new(registry, exporter)
                .with_bootstrap_interval(Duration::from_millis(config.bootstrap_interval_ms)),
        );

        let listener = TcpListener::bind(("0.0.0.0", config.api_port))
            .await
            .with_context(|| format!("failed to bind API port {}", config.api_port))?;
        let api_addr = listener.local_addr()?;
        let api = tokio::spawn(api::serve(listener, service.clone(), cancel.clone()));

        if let Err(e) = service.start(&cancel, config) {
            cancel.cancel();
            let _ = api.await;
            return Err(e.into());
        }
        info!(bindings = config.bindings.len(), address = %api_addr, "Generation started");

        Ok(Self {
            cancel,
            service,
            api,
            api_addr,
        })
    }

    /// Binding service of this generation
    pub fn service(&self) -> &Arc<BindingService> {
        &self.service
    }

    /// Address the API listens on
    pub fn api_addr(&self) -> SocketAddr {
        self.api_addr
    }

    /// Stop the API listener, then every binding
    pub async fn stop(self) {
        self.cancel.cancel();
        match self.api.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(error = %e, "API server ended with error"),
            Err(e) => warn!(error = %e, "API task ended abnormally"),
        }
        self.service.stop().await;
        info!("Generation stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use binding_core::{BindingConfig, ConnectorSpec};
    use tokio::net::TcpStream;

    fn free_port() -> u16 {
        std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port()
    }

    fn config(api_port: u16, source_port: u16) -> BridgeConfig {
        BridgeConfig {
            api_port,
            bootstrap_interval_ms: 10,
            bindings: vec![BindingConfig::new(
                "webhook",
                ConnectorSpec::new("http")
                    .with_property("address", format!("127.0.0.1:{}", source_port)),
                ConnectorSpec::new("echo"),
            )],
            ..Default::default()
        }
    }

    async fn wait_ready(generation: &Generation) {
        for _ in 0..200 {
            if generation.service().list() == vec!["webhook"] {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("binding never became ready");
    }

    #[tokio::test]
    async fn test_reload_releases_listeners_before_next_generation() {
        let registry = Arc::new(connectors::builtin_registry());
        let exporter = Arc::new(MetricsExporter::new().unwrap());
        let (api_port, source_port) = (free_port(), free_port());
        let config = config(api_port, source_port);

        let first = Generation::start(&config, registry.clone(), exporter.clone())
            .await
            .unwrap();
        wait_ready(&first).await;
        TcpStream::connect(("127.0.0.1", api_port)).await.unwrap();
        TcpStream::connect(("127.0.0.1", source_port)).await.unwrap();

        // overlapping generations would fight over the same API port
        assert!(Generation::start(&config, registry.clone(), exporter.clone())
            .await
            .is_err());

        first.stop().await;
        assert!(TcpStream::connect(("127.0.0.1", source_port)).await.is_err());

        let second = Generation::start(&config, registry, exporter).await.unwrap();
        assert_eq!(second.api_addr().port(), api_port);
        wait_ready(&second).await;
        TcpStream::connect(("127.0.0.1", api_port)).await.unwrap();
        TcpStream::connect(("127.0.0.1", source_port)).await.unwrap();
        assert!(second.service().is_ready());

        second.stop().await;
    }
}
