//! Log middleware

use super::Middleware;
use crate::config::Properties;
use crate::stage::Stage;
use crate::{Error, Request, Response, Result};
use async_trait::async_trait;
use std::fmt;
use std::str::FromStr;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Property holding the minimum level
pub const LOG_LEVEL: &str = "log_level";

/// Minimum level of call records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogLevel {
    /// Nothing is logged
    #[default]
    None,
    /// Full request, response and error
    Debug,
    /// One-line summary per call
    Info,
    /// Failed calls only
    Error,
}

impl FromStr for LogLevel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "" | "none" => Ok(LogLevel::None),
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "error" => Ok(LogLevel::Error),
            other => Err(Error::config(
                LOG_LEVEL,
                format!("unknown log level {:?}", other),
            )),
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogLevel::None => write!(f, "none"),
            LogLevel::Debug => write!(f, "debug"),
            LogLevel::Info => write!(f, "info"),
            LogLevel::Error => write!(f, "error"),
        }
    }
}

/// Emits a record per call, gated by a minimum level
#[derive(Debug, Clone)]
pub struct LogMiddleware {
    binding: String,
    level: LogLevel,
}

impl LogMiddleware {
    /// Create middleware
    pub fn new(binding: impl Into<String>, level: LogLevel) -> Self {
        Self {
            binding: binding.into(),
            level,
        }
    }

    /// Build from binding properties
    pub fn parse(binding: impl Into<String>, properties: &Properties) -> Result<Self> {
        let level = properties
            .get(LOG_LEVEL)
            .map(|s| s.parse())
            .transpose()?
            .unwrap_or_default();
        Ok(Self::new(binding, level))
    }

    /// Configured level
    pub fn level(&self) -> LogLevel {
        self.level
    }

    /// Record a retry of the failed attempt `attempt`
    pub fn retry(&self, attempt: u32, err: &Error) {
        match self.level {
            LogLevel::Debug | LogLevel::Info => {
                info!(binding = %self.binding, attempt = attempt + 1, error = %err, "Retrying request")
            }
            LogLevel::Error => {
                error!(binding = %self.binding, attempt = attempt + 1, error = %err, "Request attempt failed")
            }
            LogLevel::None => {}
        }
    }
}

#[async_trait]
impl Middleware for LogMiddleware {
    fn name(&self) -> &'static str {
        "log"
    }

    async fn handle(
        &self,
        cancel: &CancellationToken,
        request: Request,
        next: &dyn Stage,
    ) -> Result<Response> {
        if self.level == LogLevel::None {
            return next.invoke(cancel, request).await;
        }

        let logged = (self.level == LogLevel::Debug).then(|| request.clone());
        let result = next.invoke(cancel, request).await;

        // error responses count as failures, as in the metrics middleware
        let failure = match &result {
            Ok(response) if response.is_error => Some(response.error.clone()),
            Ok(_) => None,
            Err(e) => Some(e.to_string()),
        };

        match (self.level, &result, &failure) {
            (LogLevel::Debug, Ok(response), None) => debug!(
                binding = %self.binding,
                request = ?logged,
                response = ?response,
                "Request processed"
            ),
            (LogLevel::Debug, Ok(response), Some(e)) => debug!(
                binding = %self.binding,
                request = ?logged,
                response = ?response,
                error = %e,
                "Request failed"
            ),
            (LogLevel::Debug, Err(_), Some(e)) => debug!(
                binding = %self.binding,
                request = ?logged,
                error = %e,
                "Request failed"
            ),
            (LogLevel::Info, _, None) => info!(binding = %self.binding, "Request processed successfully"),
            (LogLevel::Info, _, Some(e)) => info!(binding = %self.binding, error = %e, "Error processing request"),
            (LogLevel::Error, _, Some(e)) => error!(binding = %self.binding, error = %e, "Error processing request"),
            _ => {}
        }

        result
    }
}
