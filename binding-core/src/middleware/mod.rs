//! Middleware chain
//!
//! Every outgoing call of a binding passes through the same fixed stack:
//!
//! ```text
//! Source ─► Metadata ─► Log ─► Metrics ─► Retry ─► RateLimit ─► Target
//!                                 │          │          │
//!                                 │          │          └─ paces physical attempts
//!                                 │          └─ re-invokes the rate-limited stage
//!                                 └─ counts logical requests once
//! ```

pub mod log;
pub mod metadata;
pub mod metrics;
pub mod rate_limit;
pub mod retry;

pub use self::log::{LogLevel, LogMiddleware};
pub use self::metadata::MetadataMiddleware;
pub use self::metrics::MetricsMiddleware;
pub use self::rate_limit::RateLimiter;
pub use self::retry::{DelayType, RetryConfig, RetryPolicy};

use crate::stage::{SharedStage, Stage};
use crate::{Request, Response, Result};
use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Cross-cutting behaviour wrapped around a stage
#[async_trait]
pub trait Middleware: Send + Sync {
    /// Name for logging
    fn name(&self) -> &'static str;

    /// Handle a request, delegating to `next` as needed
    async fn handle(
        &self,
        cancel: &CancellationToken,
        request: Request,
        next: &dyn Stage,
    ) -> Result<Response>;
}

/// A middleware bound to the stage it wraps
pub struct Layer {
    middleware: Arc<dyn Middleware>,
    next: SharedStage,
}

impl Layer {
    /// Wrap `next` with `middleware`
    pub fn new(middleware: Arc<dyn Middleware>, next: SharedStage) -> Self {
        Self { middleware, next }
    }
}

#[async_trait]
impl Stage for Layer {
    async fn invoke(&self, cancel: &CancellationToken, request: Request) -> Result<Response> {
        self.middleware
            .handle(cancel, request, self.next.as_ref())
            .await
    }
}

/// Wrap `inner` with `layers`, innermost first
pub fn chain(inner: SharedStage, layers: Vec<Arc<dyn Middleware>>) -> SharedStage {
    layers
        .into_iter()
        .fold(inner, |next, middleware| -> SharedStage {
            Arc::new(Layer::new(middleware, next))
        })
}

/// Build a binding's full chain around its target
pub fn compose(
    target: SharedStage,
    rate_limiter: RateLimiter,
    retry: RetryPolicy,
    metrics: MetricsMiddleware,
    log: LogMiddleware,
    metadata: MetadataMiddleware,
) -> SharedStage {
    let layers: Vec<Arc<dyn Middleware>> = vec![
        Arc::new(rate_limiter) as Arc<dyn Middleware>,
        Arc::new(retry),
        Arc::new(metrics),
        Arc::new(log),
        Arc::new(metadata),
    ];
    chain(target, layers)
}
