//! Leaky-bucket rate limiter without slack
//!
//! GCRA with a burst of one: calls are spaced `1s / rate` apart. A caller
//! arriving after its slot has passed proceeds immediately, but idle time is
//! not banked as burst credit. A slot is only consumed once the wait for it
//! completes, so cancelled waiters do not push later calls back.

use super::Middleware;
use crate::config::{parse_property, Properties};
use crate::stage::Stage;
use crate::{Error, Request, Response, Result};
use async_trait::async_trait;
use governor::{DefaultDirectRateLimiter, Quota};
use std::fmt;
use std::num::NonZeroU32;
use tokio_util::sync::CancellationToken;

/// Property holding the allowed calls per second
pub const RATE_PER_SECONDS: &str = "rate_per_seconds";

/// Paces calls to a target
pub struct RateLimiter {
    /// `None` when unlimited
    limiter: Option<DefaultDirectRateLimiter>,
    rate: u32,
}

impl fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RateLimiter").field("rate", &self.rate).finish()
    }
}

impl RateLimiter {
    /// Create limiter for `rate` calls per second (0 = unlimited)
    pub fn new(rate: u32) -> Self {
        let limiter = NonZeroU32::new(rate).map(|per_second| {
            DefaultDirectRateLimiter::direct(
                Quota::per_second(per_second).allow_burst(NonZeroU32::MIN),
            )
        });
        Self { limiter, rate }
    }

    /// Limiter that never blocks
    pub fn unlimited() -> Self {
        Self::new(0)
    }

    /// Build from binding properties
    pub fn parse(properties: &Properties) -> Result<Self> {
        let rate = parse_property::<i64>(properties, RATE_PER_SECONDS, 0)?;
        if rate < 0 {
            return Err(Error::config(
                RATE_PER_SECONDS,
                format!("must be >= 0, got {}", rate),
            ));
        }
        let rate = u32::try_from(rate)
            .map_err(|_| Error::config(RATE_PER_SECONDS, format!("too large: {}", rate)))?;
        Ok(Self::new(rate))
    }

    /// Whether calls are never blocked
    pub fn is_unlimited(&self) -> bool {
        self.limiter.is_none()
    }

    /// Block until the next call is permitted
    pub async fn take(&self, cancel: &CancellationToken) -> Result<()> {
        let Some(limiter) = self.limiter.as_ref() else {
            return Ok(());
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(Error::Cancelled),
            _ = limiter.until_ready() => Ok(()),
        }
    }
}

#[async_trait]
impl Middleware for RateLimiter {
    fn name(&self) -> &'static str {
        "rate_limit"
    }

    async fn handle(
        &self,
        cancel: &CancellationToken,
        request: Request,
        next: &dyn Stage,
    ) -> Result<Response> {
        self.take(cancel).await?;
        next.invoke(cancel, request).await
    }
}
