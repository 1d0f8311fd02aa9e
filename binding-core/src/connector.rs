//! Source and target connector interfaces

use crate::config::ConnectorSpec;
use crate::stage::{SharedStage, Stage};
use crate::{Error, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::Span;

/// Binding-scoped context handed to connectors on init
#[derive(Debug, Clone)]
pub struct ConnectorContext {
    /// Binding name
    pub binding: String,
    /// Cancelled when the owning service shuts down
    pub cancel: CancellationToken,
    /// Span carrying the binding name; connectors log inside it
    pub span: Span,
}

impl ConnectorContext {
    /// Create context for a binding
    pub fn new(binding: impl Into<String>, cancel: CancellationToken) -> Self {
        let binding = binding.into();
        let span = tracing::info_span!("binding", name = %binding);
        Self {
            binding,
            cancel,
            span,
        }
    }
}

/// Inbound side of a binding
#[async_trait]
pub trait Source: Send + Sync {
    /// Connector kind
    fn kind(&self) -> &str;

    /// Validate properties and prepare resources
    async fn init(&mut self, spec: &ConnectorSpec, ctx: &ConnectorContext) -> Result<()>;

    /// Begin pushing inbound messages into `downstream`
    async fn start(&mut self, downstream: SharedStage, cancel: CancellationToken) -> Result<()>;

    /// Stop consuming and release resources
    async fn stop(&mut self) -> Result<()>;
}

/// Outbound side of a binding
#[async_trait]
pub trait Target: Stage {
    /// Connector kind
    fn kind(&self) -> &str;

    /// Validate properties and prepare resources
    async fn init(&mut self, spec: &ConnectorSpec, ctx: &ConnectorContext) -> Result<()>;

    /// Release resources
    async fn stop(&self) -> Result<()>;
}

type SourceFactory = Arc<dyn Fn() -> Box<dyn Source> + Send + Sync>;
type TargetFactory = Arc<dyn Fn() -> Box<dyn Target> + Send + Sync>;

/// Kind -> constructor lookup for connectors
#[derive(Default, Clone)]
pub struct ConnectorRegistry {
    sources: HashMap<String, SourceFactory>,
    targets: HashMap<String, TargetFactory>,
}

impl ConnectorRegistry {
    /// Create empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a source kind
    pub fn register_source<F>(&mut self, kind: impl Into<String>, factory: F) -> &mut Self
    where
        F: Fn() -> Box<dyn Source> + Send + Sync + 'static,
    {
        self.sources.insert(kind.into(), Arc::new(factory));
        self
    }

    /// Register a target kind
    pub fn register_target<F>(&mut self, kind: impl Into<String>, factory: F) -> &mut Self
    where
        F: Fn() -> Box<dyn Target> + Send + Sync + 'static,
    {
        self.targets.insert(kind.into(), Arc::new(factory));
        self
    }

    /// New source instance for kind
    pub fn source(&self, kind: &str) -> Result<Box<dyn Source>> {
        self.sources
            .get(kind)
            .map(|f| f())
            .ok_or_else(|| Error::config("source.kind", format!("unknown source kind {:?}", kind)))
    }

    /// New target instance for kind
    pub fn target(&self, kind: &str) -> Result<Box<dyn Target>> {
        self.targets
            .get(kind)
            .map(|f| f())
            .ok_or_else(|| Error::config("target.kind", format!("unknown target kind {:?}", kind)))
    }

    /// Registered source kinds, sorted
    pub fn source_kinds(&self) -> Vec<String> {
        let mut kinds: Vec<String> = self.sources.keys().cloned().collect();
        kinds.sort();
        kinds
    }

    /// Registered target kinds, sorted
    pub fn target_kinds(&self) -> Vec<String> {
        let mut kinds: Vec<String> = self.targets.keys().cloned().collect();
        kinds.sort();
        kinds
    }
}

impl std::fmt::Debug for ConnectorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectorRegistry")
            .field("sources", &self.source_kinds())
            .field("targets", &self.target_kinds())
            .finish()
    }
}
