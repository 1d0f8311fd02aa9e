//! Metrics middleware

use super::Middleware;
use crate::metrics::{MetricsExporter, Report};
use crate::stage::Stage;
use crate::{Request, Response, Result};
use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Counts requests, responses, bytes and errors of a binding
pub struct MetricsMiddleware {
    exporter: Arc<MetricsExporter>,
    template: Report,
}

impl MetricsMiddleware {
    /// Create middleware reporting under `template`'s key
    pub fn new(exporter: Arc<MetricsExporter>, template: Report) -> Self {
        Self {
            exporter,
            template: template.empty(),
        }
    }

    /// Key reported under
    pub fn key(&self) -> &str {
        &self.template.key
    }

    /// Reset this binding's counters
    pub fn clear(&self) -> bool {
        self.exporter.clear(&self.template.key)
    }
}

#[async_trait]
impl Middleware for MetricsMiddleware {
    fn name(&self) -> &'static str {
        "metrics"
    }

    async fn handle(
        &self,
        cancel: &CancellationToken,
        request: Request,
        next: &dyn Stage,
    ) -> Result<Response> {
        let mut delta = self.template.empty();
        delta.request_count = 1;
        delta.request_volume = request.size();
        self.exporter.report(&delta);

        let result = next.invoke(cancel, request).await;

        let mut delta = self.template.empty();
        match &result {
            Ok(response) if !response.is_error => {
                delta.response_count = 1;
                delta.response_volume = response.size();
            }
            _ => delta.errors_count = 1,
        }
        self.exporter.report(&delta);

        result
    }
}
