//! Shared connectors for integration tests

use async_trait::async_trait;
use binding_core::{
    ConnectorContext, ConnectorRegistry, ConnectorSpec, Error, Request, Response, Result,
    SharedStage, Source, Stage, Target,
};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Source that holds the downstream chain without producing anything
#[derive(Default)]
pub struct IdleSource;

#[async_trait]
impl Source for IdleSource {
    fn kind(&self) -> &str {
        "idle"
    }

    async fn init(&mut self, _spec: &ConnectorSpec, _ctx: &ConnectorContext) -> Result<()> {
        Ok(())
    }

    async fn start(&mut self, _downstream: SharedStage, _cancel: CancellationToken) -> Result<()> {
        Ok(())
    }

    async fn stop(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Target answering with the request payload, or failing when
/// the request carries `fail = true` metadata
pub struct EchoTarget;

#[async_trait]
impl Stage for EchoTarget {
    async fn invoke(&self, _cancel: &CancellationToken, request: Request) -> Result<Response> {
        if request.metadata.get("fail").map(String::as_str) == Some("true") {
            return Err(Error::Connector("requested failure".into()));
        }
        Ok(Response::new(request.data))
    }
}

#[async_trait]
impl Target for EchoTarget {
    fn kind(&self) -> &str {
        "echo"
    }

    async fn init(&mut self, _spec: &ConnectorSpec, _ctx: &ConnectorContext) -> Result<()> {
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        Ok(())
    }
}

/// Target that always fails and counts its calls
pub struct FailingTarget {
    pub calls: Arc<AtomicU32>,
}

#[async_trait]
impl Stage for FailingTarget {
    async fn invoke(&self, _cancel: &CancellationToken, _request: Request) -> Result<Response> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        Err(Error::Connector(format!("attempt {} failed", n)))
    }
}

#[async_trait]
impl Target for FailingTarget {
    fn kind(&self) -> &str {
        "failing"
    }

    async fn init(&mut self, _spec: &ConnectorSpec, _ctx: &ConnectorContext) -> Result<()> {
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        Ok(())
    }
}

/// Registry with `idle` source and `echo` / `failing` targets
pub fn registry(failing_calls: Arc<AtomicU32>) -> ConnectorRegistry {
    let mut registry = ConnectorRegistry::new();
    registry
        .register_source("idle", || Box::new(IdleSource) as Box<dyn Source>)
        .register_target("echo", || Box::new(EchoTarget) as Box<dyn Target>)
        .register_target("failing", move || {
            Box::new(FailingTarget {
                calls: failing_calls.clone(),
            }) as Box<dyn Target>
        });
    registry
}
