//! Binding service: concurrent registry of binders

use crate::binder::{Binder, BinderState};
use crate::config::{BindingConfig, BridgeConfig};
use crate::connector::ConnectorRegistry;
use crate::metrics::{MetricsExporter, Report};
use crate::types::{mask_properties, Request, Response, SendRequest, Status};
use crate::{Error, Result};
use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

struct BindingHandle {
    binder: tokio::sync::Mutex<Binder>,
    chain: crate::stage::SharedStage,
}

/// Owns every running binding plus the shared metrics exporter
pub struct BindingService {
    registry: Arc<ConnectorRegistry>,
    exporter: Arc<MetricsExporter>,
    binders: DashMap<String, Arc<BindingHandle>>,
    statuses: DashMap<String, Status>,
    cancel: Mutex<CancellationToken>,
    bootstrap: Mutex<Vec<JoinHandle<()>>>,
    bootstrap_interval: Duration,
}

impl BindingService {
    /// Create service
    pub fn new(registry: Arc<ConnectorRegistry>, exporter: Arc<MetricsExporter>) -> Self {
        Self {
            registry,
            exporter,
            binders: DashMap::new(),
            statuses: DashMap::new(),
            cancel: Mutex::new(CancellationToken::new()),
            bootstrap: Mutex::new(Vec::new()),
            bootstrap_interval: Duration::from_millis(crate::DEFAULT_BOOTSTRAP_INTERVAL_MS),
        }
    }

    /// Override the interval between bootstrap attempts
    pub fn with_bootstrap_interval(mut self, interval: Duration) -> Self {
        self.bootstrap_interval = interval;
        self
    }

    /// Shared metrics exporter
    pub fn exporter(&self) -> &Arc<MetricsExporter> {
        &self.exporter
    }

    fn token(&self) -> CancellationToken {
        self.cancel.lock().clone()
    }

    /// Launch one bootstrap task per configured binding
    ///
    /// Each task retries `add` every bootstrap interval until it succeeds or
    /// `cancel` (or `stop`) fires. Returns once the tasks are spawned.
    pub fn start(self: &Arc<Self>, cancel: &CancellationToken, config: &BridgeConfig) -> Result<()> {
        config.validate()?;
        let token = cancel.child_token();
        *self.cancel.lock() = token.clone();

        let mut tasks = self.bootstrap.lock();
        for binding in config.bindings.iter().cloned() {
            let service = Arc::clone(self);
            let token = token.clone();
            tasks.push(tokio::spawn(async move {
                service.bootstrap(binding, token).await;
            }));
        }
        info!(bindings = config.bindings.len(), "Binding service started");
        Ok(())
    }

    async fn bootstrap(&self, binding: BindingConfig, cancel: CancellationToken) {
        loop {
            if cancel.is_cancelled() {
                return;
            }
            match self.add(&binding).await {
                Ok(()) => return,
                Err(e) => {
                    error!(
                        binding = %binding.name,
                        error = %e,
                        retry_in_ms = self.bootstrap_interval.as_millis() as u64,
                        "Failed to start binding"
                    );
                }
            }
            tokio::select! {
                _ = tokio::time::sleep(self.bootstrap_interval) => {}
                _ = cancel.cancelled() => return,
            }
        }
    }

    /// Initialize, start and register a binding
    pub async fn add(&self, config: &BindingConfig) -> Result<()> {
        config.validate()?;
        match self.statuses.entry(config.name.clone()) {
            Entry::Occupied(_) => return Err(Error::BindingExists(config.name.clone())),
            Entry::Vacant(slot) => {
                slot.insert(Status {
                    binding: config.name.clone(),
                    ready: false,
                    source_kind: config.source.kind.clone(),
                    source_properties: mask_properties(&config.source.properties),
                    target_kind: config.target.kind.clone(),
                    target_properties: mask_properties(&config.target.properties),
                    updated_at: Utc::now(),
                });
            }
        }

        match self.start_binder(config).await {
            Ok(handle) => {
                self.binders.insert(config.name.clone(), handle);
                if let Some(mut status) = self.statuses.get_mut(&config.name) {
                    status.ready = true;
                    status.updated_at = Utc::now();
                }
                info!(binding = %config.name, "Binding added");
                Ok(())
            }
            Err(e) => {
                self.statuses.remove(&config.name);
                Err(e)
            }
        }
    }

    async fn start_binder(&self, config: &BindingConfig) -> Result<Arc<BindingHandle>> {
        let token = self.token();
        let mut binder = Binder::new();
        binder
            .init(config, self.exporter.clone(), &self.registry, token.clone())
            .await?;

        if let Err(e) = binder.start(token).await {
            if let Err(stop_err) = binder.stop().await {
                warn!(binding = %config.name, error = %stop_err, "Failed to stop binding after start failure");
            }
            return Err(e);
        }

        let chain = binder
            .chain()
            .ok_or_else(|| Error::InvalidState(format!("binding {} has no chain", config.name)))?;
        Ok(Arc::new(BindingHandle {
            binder: tokio::sync::Mutex::new(binder),
            chain,
        }))
    }

    /// Stop and unregister a binding
    ///
    /// The name stays registered until the binder has stopped, so a
    /// concurrent `add` of the same name cannot overlap the old connectors.
    pub async fn remove(&self, name: &str) -> Result<()> {
        let handle = self
            .binders
            .get(name)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| Error::BindingNotFound(name.to_string()))?;

        let result = {
            let mut binder = handle.binder.lock().await;
            if binder.state() == BinderState::Stopped {
                return Err(Error::BindingNotFound(name.to_string()));
            }
            binder.stop().await
        };

        self.binders
            .remove_if(name, |_, current| Arc::ptr_eq(current, &handle));
        self.statuses.remove(name);
        info!(binding = %name, "Binding removed");
        result
    }

    /// Cancel bootstrap loops and remove every binding
    pub async fn stop(&self) {
        self.token().cancel();

        let tasks: Vec<_> = self.bootstrap.lock().drain(..).collect();
        for task in tasks {
            if let Err(e) = task.await {
                warn!(error = %e, "Bootstrap task ended abnormally");
            }
        }

        let names: Vec<String> = self.binders.iter().map(|e| e.key().clone()).collect();
        for name in names {
            if let Err(e) = self.remove(&name).await {
                error!(binding = %name, error = %e, "Failed to remove binding");
            }
        }
        info!("Binding service stopped");
    }

    /// Invoke a binding's chain with a raw JSON request envelope
    ///
    /// Never fails: lookup, parse and chain errors come back as error responses.
    pub async fn send_request(&self, name: &str, raw: &[u8]) -> Response {
        match Request::from_bytes(raw) {
            Ok(request) => self.send(name, request).await,
            Err(e) => Response::from_error(&e),
        }
    }

    /// Invoke a binding's chain with a `{binding, payload}` body
    pub async fn send_body(&self, body: SendRequest) -> Response {
        self.send(&body.binding, body.payload).await
    }

    /// Invoke a binding's chain with a parsed request
    pub async fn send(&self, name: &str, request: Request) -> Response {
        let chain = match self.binders.get(name) {
            Some(handle) => handle.chain.clone(),
            None => return Response::from_error(&Error::BindingNotFound(name.to_string())),
        };

        match chain.invoke(&self.token(), request).await {
            Ok(response) => response,
            Err(e) => Response::from_error(&e),
        }
    }

    /// Names of registered bindings, sorted
    pub fn list(&self) -> Vec<String> {
        let mut names: Vec<String> = self.binders.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    /// Snapshot of every binding's status, sorted by name
    pub fn status(&self) -> Vec<Status> {
        let mut statuses: Vec<Status> = self.statuses.iter().map(|s| s.value().clone()).collect();
        statuses.sort_by(|a, b| a.binding.cmp(&b.binding));
        statuses
    }

    /// Snapshot of every metrics report
    pub fn stats(&self) -> Vec<Report> {
        self.exporter.list()
    }

    /// Whether every registered status is ready
    pub fn is_ready(&self) -> bool {
        !self.token().is_cancelled() && self.statuses.iter().all(|s| s.ready)
    }
}
