use async_trait::async_trait;
use binding_core::{ConnectorContext, ConnectorSpec, Request, Response, Result, Stage, Target};
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Logs each request and answers with an empty success
#[derive(Debug, Default)]
pub struct LogTarget {
    binding: String,
}

impl LogTarget {
    /// Create target
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Stage for LogTarget {
    async fn invoke(&self, _cancel: &CancellationToken, request: Request) -> Result<Response> {
        info!(
            binding = %self.binding,
            bytes = request.data.len(),
            metadata = ?request.metadata,
            payload = %String::from_utf8_lossy(&request.data),
            "Request received"
        );
        Ok(Response::default())
    }
}

#[async_trait]
impl Target for LogTarget {
    fn kind(&self) -> &str {
        "log"
    }

    async fn init(&mut self, _spec: &ConnectorSpec, ctx: &ConnectorContext) -> Result<()> {
        self.binding = ctx.binding.clone();
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        Ok(())
    }
}
