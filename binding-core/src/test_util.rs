//! In-memory connectors for unit tests

use crate::config::ConnectorSpec;
use crate::connector::{ConnectorContext, ConnectorRegistry, Source, Target};
use crate::stage::{SharedStage, Stage};
use crate::{Error, Request, Response, Result};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

#[derive(Default)]
struct Inner {
    source_started: AtomicBool,
    fail_source_stop: AtomicBool,
    fail_target_stop: AtomicBool,
    target_stops: AtomicU32,
    target_init_failures: AtomicU32,
    source_stop_calls: AtomicU32,
    source_stop_gate: Mutex<Option<Arc<Notify>>>,
}

/// Knobs and observations shared with the test connectors
#[derive(Clone, Default)]
pub struct Flags(Arc<Inner>);

impl Flags {
    pub fn source_started(&self) -> bool {
        self.0.source_started.load(Ordering::SeqCst)
    }

    pub fn fail_source_stop(&self) {
        self.0.fail_source_stop.store(true, Ordering::SeqCst);
    }

    pub fn fail_target_stop(&self) {
        self.0.fail_target_stop.store(true, Ordering::SeqCst);
    }

    pub fn target_stops(&self) -> u32 {
        self.0.target_stops.load(Ordering::SeqCst)
    }

    pub fn fail_target_inits(&self, times: u32) {
        self.0.target_init_failures.store(times, Ordering::SeqCst);
    }

    pub fn source_stop_calls(&self) -> u32 {
        self.0.source_stop_calls.load(Ordering::SeqCst)
    }

    /// Make source stops wait for a permit on the returned gate
    pub fn gate_source_stop(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.0.source_stop_gate.lock() = Some(gate.clone());
        gate
    }
}

/// Source that only records that it was started
pub struct ManualSource {
    flags: Flags,
    downstream: Option<SharedStage>,
}

#[async_trait]
impl Source for ManualSource {
    fn kind(&self) -> &str {
        "manual"
    }

    async fn init(&mut self, _spec: &ConnectorSpec, _ctx: &ConnectorContext) -> Result<()> {
        Ok(())
    }

    async fn start(&mut self, downstream: SharedStage, _cancel: CancellationToken) -> Result<()> {
        self.downstream = Some(downstream);
        self.flags.0.source_started.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn stop(&mut self) -> Result<()> {
        self.flags.0.source_stop_calls.fetch_add(1, Ordering::SeqCst);
        let gate = self.flags.0.source_stop_gate.lock().take();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        self.downstream = None;
        if self.flags.0.fail_source_stop.load(Ordering::SeqCst) {
            return Err(Error::Connector("source stop failed".into()));
        }
        Ok(())
    }
}

/// Target answering with the request payload
pub struct EchoTarget {
    flags: Flags,
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
        let remaining = &self.flags.0.target_init_failures;
        if remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(Error::Connector("target not reachable yet".into()));
        }
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        self.flags.0.target_stops.fetch_add(1, Ordering::SeqCst);
        if self.flags.0.fail_target_stop.load(Ordering::SeqCst) {
            return Err(Error::Connector("target stop failed".into()));
        }
        Ok(())
    }
}

/// Registry with `manual` source and `echo` target
pub fn registry(flags: &Flags) -> ConnectorRegistry {
    let mut registry = ConnectorRegistry::new();
    let f = flags.clone();
    registry.register_source("manual", move || {
        Box::new(ManualSource {
            flags: f.clone(),
            downstream: None,
        }) as Box<dyn Source>
    });
    let f = flags.clone();
    registry.register_target("echo", move || {
        Box::new(EchoTarget { flags: f.clone() }) as Box<dyn Target>
    });
    registry
}
