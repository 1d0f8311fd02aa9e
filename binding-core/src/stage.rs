//! Callable stage contract

use crate::{Request, Response, Result};
use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Anything that turns a request into a response: targets and wrapped middlewares
#[async_trait]
pub trait Stage: Send + Sync {
    /// Process one request
    async fn invoke(&self, cancel: &CancellationToken, request: Request) -> Result<Response>;
}

/// Shared, type-erased stage
pub type SharedStage = Arc<dyn Stage>;

/// Stage backed by an async closure
pub struct FnStage<F> {
    func: F,
}

#[async_trait]
impl<F, Fut> Stage for FnStage<F>
where
    F: Fn(Request) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Response>> + Send,
{
    async fn invoke(&self, _cancel: &CancellationToken, request: Request) -> Result<Response> {
        (self.func)(request).await
    }
}

/// Wrap an async closure as a shared stage
pub fn stage_fn<F, Fut>(func: F) -> SharedStage
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Response>> + Send + 'static,
{
    Arc::new(FnStage { func })
}
