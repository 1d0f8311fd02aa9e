//! Retry middleware with fixed, back-off and random delays

use super::Middleware;
use crate::config::{parse_property, Properties};
use crate::stage::Stage;
use crate::{Error, Request, Response, Result};
use async_trait::async_trait;
use rand::Rng;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Property keys
pub const RETRY_ATTEMPTS: &str = "retry_attempts";
/// Delay ceiling in milliseconds
pub const RETRY_DELAY_MILLISECONDS: &str = "retry_delay_milliseconds";
/// Jitter bound in milliseconds
pub const RETRY_MAX_JITTER_MILLISECONDS: &str = "retry_max_jitter_milliseconds";
/// One of `fixed`, `back-off`, `random`
pub const RETRY_DELAY_TYPE: &str = "retry_delay_type";

/// Starting delay before clamping to the ceiling
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(100);

/// Largest exponent used by back-off before saturating
const MAX_BACKOFF_SHIFT: u32 = 30;

/// Delay algorithm between attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DelayType {
    /// Constant delay
    Fixed,
    /// Delay doubles with each attempt
    BackOff,
    /// Uniform delay up to the ceiling plus jitter
    Random,
}

impl FromStr for DelayType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "fixed" => Ok(DelayType::Fixed),
            "back-off" | "" => Ok(DelayType::BackOff),
            "random" => Ok(DelayType::Random),
            other => Err(Error::config(
                RETRY_DELAY_TYPE,
                format!("unknown delay type {:?}", other),
            )),
        }
    }
}

impl fmt::Display for DelayType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DelayType::Fixed => write!(f, "fixed"),
            DelayType::BackOff => write!(f, "back-off"),
            DelayType::Random => write!(f, "random"),
        }
    }
}

/// Retry configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryConfig {
    /// Total attempts, including the first call
    pub attempts: u32,
    /// Starting delay for fixed and back-off
    pub base_delay: Duration,
    /// Ceiling every computed delay is clamped to
    pub max_delay: Duration,
    /// Upper bound of the random jitter term
    pub max_jitter: Duration,
    /// Delay algorithm
    pub delay_type: DelayType,
    /// Return only the last error instead of all of them
    pub last_error_only: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            attempts: 1,
            base_delay: DEFAULT_BASE_DELAY,
            max_delay: Duration::from_millis(100),
            max_jitter: Duration::from_millis(100),
            delay_type: DelayType::BackOff,
            last_error_only: false,
        }
    }
}

impl RetryConfig {
    /// Build from binding properties, validating ranges
    pub fn parse(properties: &Properties) -> Result<Self> {
        let attempts = parse_property::<i64>(properties, RETRY_ATTEMPTS, 1)?;
        if attempts < 1 {
            return Err(Error::config(
                RETRY_ATTEMPTS,
                format!("must be >= 1, got {}", attempts),
            ));
        }
        let attempts = u32::try_from(attempts)
            .map_err(|_| Error::config(RETRY_ATTEMPTS, format!("too large: {}", attempts)))?;

        let delay_ms = parse_property::<i64>(properties, RETRY_DELAY_MILLISECONDS, 100)?;
        if delay_ms < 0 {
            return Err(Error::config(
                RETRY_DELAY_MILLISECONDS,
                format!("must be >= 0, got {}", delay_ms),
            ));
        }

        let jitter_ms = parse_property::<i64>(properties, RETRY_MAX_JITTER_MILLISECONDS, 100)?;
        if jitter_ms < 1 {
            return Err(Error::config(
                RETRY_MAX_JITTER_MILLISECONDS,
                format!("must be >= 1, got {}", jitter_ms),
            ));
        }

        let delay_type = properties
            .get(RETRY_DELAY_TYPE)
            .map(|s| s.parse())
            .transpose()?
            .unwrap_or(DelayType::BackOff);

        Ok(Self {
            attempts,
            max_delay: Duration::from_millis(delay_ms as u64),
            max_jitter: Duration::from_millis(jitter_ms as u64),
            delay_type,
            ..Default::default()
        })
    }

    /// Delay to wait after the failed attempt `n` (0-based)
    pub fn delay(&self, n: u32) -> Duration {
        let delay = match self.delay_type {
            DelayType::Fixed => self.base_delay,
            DelayType::BackOff => self
                .base_delay
                .checked_mul(1u32 << n.min(MAX_BACKOFF_SHIFT))
                .unwrap_or(Duration::MAX),
            DelayType::Random => {
                let mut rng = rand::thread_rng();
                let spread = rng.gen_range(0..=self.max_delay.as_millis() as u64);
                let jitter = rng.gen_range(0..self.max_jitter.as_millis().max(1) as u64);
                Duration::from_millis(spread.saturating_add(jitter))
            }
        };
        delay.min(self.max_delay)
    }
}

/// Hook fired before each re-attempt with the failed attempt index and its error
pub type OnRetry = Arc<dyn Fn(u32, &Error) + Send + Sync>;

/// Retry policy wrapping a stage
pub struct RetryPolicy {
    config: RetryConfig,
    on_retry: Option<OnRetry>,
}

impl RetryPolicy {
    /// Create new policy
    pub fn new(config: RetryConfig) -> Self {
        Self {
            config,
            on_retry: None,
        }
    }

    /// Build from binding properties
    pub fn parse(properties: &Properties) -> Result<Self> {
        Ok(Self::new(RetryConfig::parse(properties)?))
    }

    /// Install an observability hook
    pub fn with_on_retry(mut self, hook: OnRetry) -> Self {
        self.on_retry = Some(hook);
        self
    }

    /// Configuration in use
    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Call `next` until it succeeds, fails unrecoverably or attempts run out
    pub async fn execute(
        &self,
        cancel: &CancellationToken,
        request: Request,
        next: &dyn Stage,
    ) -> Result<Response> {
        let attempts = self.config.attempts.max(1);
        let mut errors = Vec::new();

        for n in 0..attempts {
            let err = match next.invoke(cancel, request.clone()).await {
                Ok(response) => return Ok(response),
                Err(err) => err,
            };

            let recoverable = err.is_recoverable();
            errors.push(err);
            if !recoverable || n + 1 == attempts {
                break;
            }

            if let (Some(hook), Some(last)) = (&self.on_retry, errors.last()) {
                hook(n, last);
            }

            let delay = self.config.delay(n);
            debug!(attempt = n + 1, delay_ms = delay.as_millis() as u64, "Retrying");
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = cancel.cancelled() => {
                    errors.push(Error::Cancelled);
                    return Err(Error::Multiple(errors));
                }
            }
        }

        Err(self.finish(errors))
    }

    fn finish(&self, mut errors: Vec<Error>) -> Error {
        if self.config.last_error_only || errors.len() == 1 {
            return errors.pop().unwrap_or(Error::Cancelled);
        }
        Error::RetryExhausted {
            attempts: errors.len() as u32,
            errors,
        }
    }
}

#[async_trait]
impl Middleware for RetryPolicy {
    fn name(&self) -> &'static str {
        "retry"
    }

    async fn handle(
        &self,
        cancel: &CancellationToken,
        request: Request,
        next: &dyn Stage,
    ) -> Result<Response> {
        self.execute(cancel, request, next).await
    }
}
