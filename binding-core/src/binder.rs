//! Binder: one source, one target and the chain between them

use crate::config::BindingConfig;
use crate::connector::{ConnectorContext, ConnectorRegistry, Source, Target};
use crate::error::InitStage;
use crate::metrics::{MetricsExporter, Report};
use crate::middleware::{
    compose, LogMiddleware, MetadataMiddleware, MetricsMiddleware, RateLimiter, RetryPolicy,
};
use crate::stage::{SharedStage, Stage};
use crate::{Error, Request, Response, Result};
use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn, Instrument};

/// Binder lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinderState {
    /// Created, nothing loaded
    Uninitialized,
    /// Connectors loaded, chain composed
    Initialized,
    /// Source running
    Started,
    /// Connectors stopped
    Stopped,
}

/// Adapts a shared target to the stage contract
struct TargetStage(Arc<dyn Target>);

#[async_trait]
impl Stage for TargetStage {
    async fn invoke(&self, cancel: &CancellationToken, request: Request) -> Result<Response> {
        self.0.invoke(cancel, request).await
    }
}

/// Runtime object of a single binding
pub struct Binder {
    name: String,
    state: BinderState,
    source: Option<Box<dyn Source>>,
    target: Option<Arc<dyn Target>>,
    chain: Option<SharedStage>,
    metrics_key: Option<String>,
}

impl Default for Binder {
    fn default() -> Self {
        Self::new()
    }
}

impl Binder {
    /// Create uninitialized binder
    pub fn new() -> Self {
        Self {
            name: String::new(),
            state: BinderState::Uninitialized,
            source: None,
            target: None,
            chain: None,
            metrics_key: None,
        }
    }

    /// Binding name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Lifecycle state
    pub fn state(&self) -> BinderState {
        self.state
    }

    /// Composed chain, once initialized
    pub fn chain(&self) -> Option<SharedStage> {
        self.chain.clone()
    }

    /// Metrics key of this binding, once initialized
    pub fn metrics_key(&self) -> Option<&str> {
        self.metrics_key.as_deref()
    }

    /// Load target, middlewares and source for `config`
    pub async fn init(
        &mut self,
        config: &BindingConfig,
        exporter: Arc<MetricsExporter>,
        registry: &ConnectorRegistry,
        cancel: CancellationToken,
    ) -> Result<()> {
        if self.state != BinderState::Uninitialized {
            return Err(Error::InvalidState(format!(
                "binding {} already initialized",
                config.name
            )));
        }
        self.name = config.name.clone();
        let ctx = ConnectorContext::new(&config.name, cancel);
        let fail = |stage: InitStage| {
            let binding = config.name.clone();
            move |source: Error| Error::Init {
                binding,
                stage,
                source: Box::new(source),
            }
        };

        let log = LogMiddleware::parse(&config.name, &config.properties)
            .map_err(fail(InitStage::Log))?;

        let target: Arc<dyn Target> = {
            let mut target = registry
                .target(&config.target.kind)
                .map_err(fail(InitStage::Target))?;
            target
                .init(&config.target, &ctx)
                .instrument(ctx.span.clone())
                .await
                .map_err(fail(InitStage::Target))?;
            Arc::from(target)
        };

        let chain = match Self::build_chain(config, target.clone(), log, exporter) {
            Ok(chain) => chain,
            Err(e) => {
                Self::release_target(&config.name, &target).await;
                return Err(fail(InitStage::Middleware)(e));
            }
        };

        let source = match Self::load_source(config, registry, &ctx).await {
            Ok(source) => source,
            Err(e) => {
                Self::release_target(&config.name, &target).await;
                return Err(fail(InitStage::Source)(e));
            }
        };

        self.metrics_key =
            Some(Report::new(&config.name, &config.source.kind, &config.target.kind).key);
        self.target = Some(target);
        self.chain = Some(chain);
        self.source = Some(source);
        self.state = BinderState::Initialized;
        info!(binding = %config.name, "Binding initialized");
        Ok(())
    }

    fn build_chain(
        config: &BindingConfig,
        target: Arc<dyn Target>,
        log: LogMiddleware,
        exporter: Arc<MetricsExporter>,
    ) -> Result<SharedStage> {
        let rate_limiter = RateLimiter::parse(&config.properties)?;
        let retry_log = log.clone();
        let retry = RetryPolicy::parse(&config.properties)?
            .with_on_retry(Arc::new(move |attempt, err| retry_log.retry(attempt, err)));
        let metrics = MetricsMiddleware::new(
            exporter,
            Report::new(&config.name, &config.source.kind, &config.target.kind),
        );
        let metadata = MetadataMiddleware::parse(&config.properties);

        Ok(compose(
            Arc::new(TargetStage(target)),
            rate_limiter,
            retry,
            metrics,
            log,
            metadata,
        ))
    }

    async fn load_source(
        config: &BindingConfig,
        registry: &ConnectorRegistry,
        ctx: &ConnectorContext,
    ) -> Result<Box<dyn Source>> {
        let mut source = registry.source(&config.source.kind)?;
        source
            .init(&config.source, ctx)
            .instrument(ctx.span.clone())
            .await?;
        Ok(source)
    }

    async fn release_target(binding: &str, target: &Arc<dyn Target>) {
        if let Err(e) = target.stop().await {
            warn!(binding = %binding, error = %e, "Failed to stop target after init failure");
        }
    }

    /// Start the source with the chain as its downstream
    pub async fn start(&mut self, cancel: CancellationToken) -> Result<()> {
        let (Some(chain), Some(source)) = (self.chain.clone(), self.source.as_mut()) else {
            return Err(Error::InvalidState(format!(
                "binding {}: chain and source must be initialized before start",
                self.name
            )));
        };
        if self.state != BinderState::Initialized {
            return Err(Error::InvalidState(format!(
                "binding {}: cannot start from {:?}",
                self.name, self.state
            )));
        }

        source.start(chain, cancel).await?;
        self.state = BinderState::Started;
        info!(binding = %self.name, "Binding started");
        Ok(())
    }

    /// Stop source then target, attempting both
    pub async fn stop(&mut self) -> Result<()> {
        let mut errors = Vec::new();

        if let Some(source) = self.source.as_mut() {
            if let Err(e) = source.stop().await {
                warn!(binding = %self.name, error = %e, "Failed to stop source");
                errors.push(e);
            }
        }
        if let Some(target) = self.target.as_ref() {
            if let Err(e) = target.stop().await {
                warn!(binding = %self.name, error = %e, "Failed to stop target");
                errors.push(e);
            }
        }

        self.state = BinderState::Stopped;
        info!(binding = %self.name, "Binding stopped");
        match Error::combine(errors) {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
