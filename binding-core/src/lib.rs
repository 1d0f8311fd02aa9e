//! # Binding Core
//!
//! Routes messages from a source connector to a target connector through a
//! fixed middleware stack, for many independent bindings at once:
//! - Leaky-bucket rate limiting without burst slack
//! - Retry with fixed, back-off or random delays
//! - Per-binding request/response/byte/error counters with Prometheus export
//! - Level-gated call logging
//! - Static metadata injection
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │            Binding Service (registry + bootstrap)        │
//! └────────────┬─────────────────────────────────────────────┘
//!              │ one Binder per binding
//!     ┌────────▼────────┐
//!     │     Binder      │
//!     └───┬─────────┬───┘
//!         │         │
//!   ┌─────▼──┐   ┌──▼──────────────────────────────────────┐
//!   │ Source ├──►│ Metadata ► Log ► Metrics ► Retry ► Rate │──► Target
//!   └────────┘   └─────────────────────────────────────────┘
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

pub mod binder;
pub mod config;
pub mod connector;
pub mod error;
pub mod metrics;
pub mod middleware;
pub mod service;
pub mod stage;
pub mod types;

#[cfg(test)]
pub(crate) mod test_util;

pub use binder::{Binder, BinderState};
pub use config::{BindingConfig, BridgeConfig, ConnectorSpec, Properties};
pub use connector::{ConnectorContext, ConnectorRegistry, Source, Target};
pub use error::{Error, InitStage, Result};
pub use metrics::{MetricsExporter, MetricsStore, Report};
pub use service::BindingService;
pub use stage::{stage_fn, SharedStage, Stage};
pub use types::{Metadata, Request, Response, SendRequest, Status};

/// Default interval between bootstrap attempts of a failing binding (milliseconds)
pub const DEFAULT_BOOTSTRAP_INTERVAL_MS: u64 = 1000;
