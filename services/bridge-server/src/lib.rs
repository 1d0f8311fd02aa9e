//! # Bridge Server
//!
//! Process wrapper around the binding service: configuration loading,
//! the administrative HTTP API and hot reload.

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

pub mod api;
pub mod config;
pub mod generation;

pub use generation::Generation;
