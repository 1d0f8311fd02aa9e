//! Static metadata injection

use super::Middleware;
use crate::config::Properties;
use crate::stage::Stage;
use crate::{Metadata, Request, Response, Result};
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Property holding a JSON object of metadata
pub const METADATA: &str = "metadata";

/// Merges a fixed metadata set into every request, overwriting existing keys
#[derive(Debug, Clone, Default)]
pub struct MetadataMiddleware {
    metadata: Metadata,
}

impl MetadataMiddleware {
    /// Create middleware
    pub fn new(metadata: Metadata) -> Self {
        Self { metadata }
    }

    /// Build from binding properties; unparsable JSON yields an empty set
    pub fn parse(properties: &Properties) -> Self {
        let metadata = match properties.get(METADATA).map(|s| s.trim()) {
            None | Some("") => Metadata::new(),
            Some(raw) => serde_json::from_str(raw).unwrap_or_else(|e| {
                warn!(error = %e, "Ignoring invalid metadata property");
                Metadata::new()
            }),
        };
        Self::new(metadata)
    }

    /// Metadata merged into requests
    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }
}

#[async_trait]
impl Middleware for MetadataMiddleware {
    fn name(&self) -> &'static str {
        "metadata"
    }

    async fn handle(
        &self,
        cancel: &CancellationToken,
        mut request: Request,
        next: &dyn Stage,
    ) -> Result<Response> {
        request
            .metadata
            .extend(self.metadata.iter().map(|(k, v)| (k.clone(), v.clone())));
        next.invoke(cancel, request).await
    }
}
