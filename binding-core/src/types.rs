//! Request/response envelope and binding status

use crate::{Error, Result};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Ordered string metadata attached to requests and responses
pub type Metadata = BTreeMap<String, String>;

/// Message handed from a source into the chain
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    /// Metadata
    #[serde(default)]
    pub metadata: Metadata,
    /// Opaque payload
    #[serde(default, with = "base64_bytes")]
    pub data: Bytes,
}

impl Request {
    /// Create request from payload
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self {
            metadata: Metadata::new(),
            data: data.into(),
        }
    }

    /// Set a metadata entry
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Payload size in bytes
    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }

    /// Serialize to JSON
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Parse from JSON
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

/// Result of a chain invocation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    /// Metadata
    #[serde(default)]
    pub metadata: Metadata,
    /// Opaque payload
    #[serde(default, with = "base64_bytes")]
    pub data: Bytes,
    /// Error flag
    #[serde(default)]
    pub is_error: bool,
    /// Error message
    #[serde(default)]
    pub error: String,
}

impl Response {
    /// Successful response with payload
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self {
            data: data.into(),
            ..Default::default()
        }
    }

    /// Error response
    pub fn from_error(err: &Error) -> Self {
        Self {
            is_error: true,
            error: err.to_string(),
            ..Default::default()
        }
    }

    /// Set a metadata entry
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Payload size in bytes
    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }

    /// Serialize to JSON
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Parse from JSON
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

/// Body accepted by the service's send-request operation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendRequest {
    /// Target binding name
    pub binding: String,
    /// Request envelope
    pub payload: Request,
}

/// Readiness and connection summary of one binding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Status {
    /// Binding name
    pub binding: String,
    /// Started and registered
    pub ready: bool,
    /// Source connector kind
    pub source_kind: String,
    /// Source properties, secrets masked
    pub source_properties: BTreeMap<String, String>,
    /// Target connector kind
    pub target_kind: String,
    /// Target properties, secrets masked
    pub target_properties: BTreeMap<String, String>,
    /// Last readiness change
    pub updated_at: DateTime<Utc>,
}

const SENSITIVE_KEYS: [&str; 4] = ["password", "secret", "token", "key"];
const MASK: &str = "********";

/// Replace values of credential-like keys with a fixed mask
pub fn mask_properties(properties: &BTreeMap<String, String>) -> BTreeMap<String, String> {
    properties
        .iter()
        .map(|(k, v)| {
            let lower = k.to_lowercase();
            if SENSITIVE_KEYS.iter().any(|s| lower.contains(s)) {
                (k.clone(), MASK.to_string())
            } else {
                (k.clone(), v.clone())
            }
        })
        .collect()
}

mod base64_bytes {
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use bytes::Bytes;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(data: &Bytes, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(data))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Bytes, D::Error> {
        let encoded = Option::<String>::deserialize(deserializer)?.unwrap_or_default();
        STANDARD
            .decode(encoded.as_bytes())
            .map(Bytes::from)
            .map_err(serde::de::Error::custom)
    }
}
