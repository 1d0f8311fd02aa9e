//! # Built-in connectors
//!
//! Thin source and target implementations that plug into the binding core
//! through its connector registry:
//!
//! | kind       | side   | behaviour                                         |
//! |------------|--------|---------------------------------------------------|
//! | `http`     | source | accepts `POST /` envelopes and answers with the response |
//! | `interval` | source | pushes a fixed request on a timer                 |
//! | `echo`     | target | answers with the request payload and metadata     |
//! | `log`      | target | logs the request and answers empty                |
//! | `http`     | target | forwards the payload as an HTTP request           |

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

pub mod source;
pub mod target;

use binding_core::{ConnectorRegistry, Source, Target};

pub use source::{HttpSource, IntervalSource};
pub use target::{EchoTarget, HttpTarget, LogTarget};

/// Add every built-in connector to `registry`
pub fn register_builtin(registry: &mut ConnectorRegistry) -> &mut ConnectorRegistry {
    registry
        .register_source("http", || Box::new(HttpSource::new()) as Box<dyn Source>)
        .register_source("interval", || Box::new(IntervalSource::new()) as Box<dyn Source>)
        .register_target("echo", || Box::new(EchoTarget::new()) as Box<dyn Target>)
        .register_target("log", || Box::new(LogTarget::new()) as Box<dyn Target>)
        .register_target("http", || Box::new(HttpTarget::new()) as Box<dyn Target>)
}

/// Registry holding only the built-in connectors
pub fn builtin_registry() -> ConnectorRegistry {
    let mut registry = ConnectorRegistry::new();
    register_builtin(&mut registry);
    registry
}
