use async_trait::async_trait;
use binding_core::{ConnectorContext, ConnectorSpec, Request, Response, Result, Stage, Target};
use tokio_util::sync::CancellationToken;

/// Answers every request with its own payload and metadata
#[derive(Debug, Default)]
pub struct EchoTarget;

impl EchoTarget {
    /// Create target
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Stage for EchoTarget {
    async fn invoke(&self, _cancel: &CancellationToken, request: Request) -> Result<Response> {
        Ok(Response {
            metadata: request.metadata,
            data: request.data,
            ..Default::default()
        })
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
