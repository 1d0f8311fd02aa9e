//! Binding configuration

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::str::FromStr;

/// Free-form connector or binding properties
pub type Properties = BTreeMap<String, String>;

/// Connector selection: kind plus its properties
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectorSpec {
    /// Connector kind (registry key)
    pub kind: String,
    /// Connector properties
    #[serde(default)]
    pub properties: Properties,
}

impl ConnectorSpec {
    /// Create new spec
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            properties: Properties::new(),
        }
    }

    /// Set a property
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }
}

/// One source -> target pipeline
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BindingConfig {
    /// Unique binding name
    pub name: String,
    /// Source connector
    pub source: ConnectorSpec,
    /// Target connector
    pub target: ConnectorSpec,
    /// Middleware properties (rate limit, retry, log level, metadata)
    #[serde(default)]
    pub properties: Properties,
}

impl BindingConfig {
    /// Create new binding config
    pub fn new(name: impl Into<String>, source: ConnectorSpec, target: ConnectorSpec) -> Self {
        Self {
            name: name.into(),
            source,
            target,
            properties: Properties::new(),
        }
    }

    /// Set a middleware property
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Check name and connector kinds
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::config("name", "binding name is required"));
        }
        if self.source.kind.trim().is_empty() {
            return Err(Error::config(
                "source.kind",
                format!("binding {}: source kind is required", self.name),
            ));
        }
        if self.target.kind.trim().is_empty() {
            return Err(Error::config(
                "target.kind",
                format!("binding {}: target kind is required", self.name),
            ));
        }
        Ok(())
    }
}

/// Process-level configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Admin API port
    #[serde(default = "default_api_port")]
    pub api_port: u16,

    /// Default tracing filter
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// "text" or "json"
    #[serde(default = "default_log_format")]
    pub log_format: String,

    /// Interval between bootstrap attempts of a failing binding (milliseconds)
    #[serde(default = "default_bootstrap_interval_ms")]
    pub bootstrap_interval_ms: u64,

    /// Bindings
    #[serde(default)]
    pub bindings: Vec<BindingConfig>,
}

fn default_api_port() -> u16 {
    8080
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

fn default_bootstrap_interval_ms() -> u64 {
    crate::DEFAULT_BOOTSTRAP_INTERVAL_MS
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            api_port: default_api_port(),
            log_level: default_log_level(),
            log_format: default_log_format(),
            bootstrap_interval_ms: default_bootstrap_interval_ms(),
            bindings: Vec::new(),
        }
    }
}

impl BridgeConfig {
    /// Validate every binding and name uniqueness
    pub fn validate(&self) -> Result<()> {
        if self.bootstrap_interval_ms == 0 {
            return Err(Error::config(
                "bootstrap_interval_ms",
                "must be greater than zero",
            ));
        }

        let mut seen = HashSet::new();
        for binding in &self.bindings {
            binding.validate()?;
            if !seen.insert(binding.name.as_str()) {
                return Err(Error::config(
                    "name",
                    format!("duplicate binding name: {}", binding.name),
                ));
            }
        }
        Ok(())
    }
}

/// Parse an optional numeric property, falling back to `default` when absent or empty
pub fn parse_property<T>(properties: &Properties, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match properties.get(key).map(|v| v.trim()) {
        None | Some("") => Ok(default),
        Some(raw) => raw
            .parse()
            .map_err(|e| Error::config(key, format!("invalid value {:?}: {}", raw, e))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn binding(name: &str) -> BindingConfig {
        BindingConfig::new(name, ConnectorSpec::new("interval"), ConnectorSpec::new("echo"))
    }

    #[test]
    fn test_default_config() {
        let config = BridgeConfig::default();
        assert_eq!(config.api_port, 8080);
        assert_eq!(config.bootstrap_interval_ms, 1000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_duplicate_binding_names_rejected() {
        let config = BridgeConfig {
            bindings: vec![binding("b1"), binding("b2"), binding("b1")],
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("duplicate binding name: b1"));
    }

    #[test]
    fn test_missing_kind_rejected() {
        let mut b = binding("b1");
        b.target.kind.clear();
        assert!(matches!(b.validate(), Err(Error::Config { field, .. }) if field == "target.kind"));
    }

    #[test]
    fn test_deserialize_binding() {
        let json = r#"{
            "name": "b1",
            "source": {"kind": "http", "properties": {"address": "0.0.0.0:9000"}},
            "target": {"kind": "echo"},
            "properties": {"retry_attempts": "3"}
        }"#;
        let b: BindingConfig = serde_json::from_str(json).unwrap();
        assert_eq!(b.source.properties["address"], "0.0.0.0:9000");
        assert!(b.target.properties.is_empty());
        assert_eq!(b.properties["retry_attempts"], "3");
    }

    #[test]
    fn test_parse_property() {
        let mut props = Properties::new();
        props.insert("n".into(), " 42 ".into());
        props.insert("empty".into(), "".into());
        props.insert("bad".into(), "x".into());

        assert_eq!(parse_property::<u32>(&props, "n", 1).unwrap(), 42);
        assert_eq!(parse_property::<u32>(&props, "empty", 7).unwrap(), 7);
        assert_eq!(parse_property::<u32>(&props, "absent", 9).unwrap(), 9);
        assert!(parse_property::<u32>(&props, "bad", 1).is_err());
    }
}
