use async_trait::async_trait;
use binding_core::config::parse_property;
use binding_core::{
    ConnectorContext, ConnectorSpec, Error, Metadata, Request, Result, SharedStage, Source,
};
use bytes::Bytes;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn, Instrument, Span};

/// Pushes the same request into the chain on a fixed period
///
/// Properties: `interval_milliseconds` (default 1000), `data`, `metadata`
/// (JSON object).
#[derive(Default)]
pub struct IntervalSource {
    interval: Duration,
    data: Bytes,
    metadata: Metadata,
    span: Option<Span>,
    shutdown: Option<CancellationToken>,
    task: Option<JoinHandle<()>>,
}

impl IntervalSource {
    /// Create source
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Source for IntervalSource {
    fn kind(&self) -> &str {
        "interval"
    }

    async fn init(&mut self, spec: &ConnectorSpec, ctx: &ConnectorContext) -> Result<()> {
        let millis = parse_property::<u64>(&spec.properties, "interval_milliseconds", 1000)?;
        if millis == 0 {
            return Err(Error::config("interval_milliseconds", "must be greater than zero"));
        }
        self.interval = Duration::from_millis(millis);
        self.data = Bytes::from(spec.properties.get("data").cloned().unwrap_or_default());
        self.metadata = match spec.properties.get("metadata") {
            Some(raw) if !raw.trim().is_empty() => serde_json::from_str(raw)
                .map_err(|e| Error::config("metadata", format!("invalid JSON object: {}", e)))?,
            _ => Metadata::new(),
        };
        self.span = Some(ctx.span.clone());
        Ok(())
    }

    async fn start(&mut self, downstream: SharedStage, cancel: CancellationToken) -> Result<()> {
        if self.interval.is_zero() {
            return Err(Error::InvalidState("interval source not initialized".into()));
        }
        let shutdown = cancel.child_token();
        let token = shutdown.clone();
        let period = self.interval;
        let request = Request {
            metadata: self.metadata.clone(),
            data: self.data.clone(),
        };
        let span = self.span.clone().unwrap_or_else(Span::current);

        let task = tokio::spawn(
            async move {
                let mut ticker = tokio::time::interval(period);
                ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
                loop {
                    tokio::select! {
                        _ = ticker.tick() => {}
                        _ = token.cancelled() => break,
                    }
                    match downstream.invoke(&token, request.clone()).await {
                        Ok(resp) if resp.is_error => warn!(error = %resp.error, "Tick rejected"),
                        Ok(_) => debug!("Tick delivered"),
                        Err(e) if e.is_cancelled() => break,
                        Err(e) => warn!(error = %e, "Tick failed"),
                    }
                }
            }
            .instrument(span),
        );

        self.shutdown = Some(shutdown);
        self.task = Some(task);
        Ok(())
    }

    async fn stop(&mut self) -> Result<()> {
        if let Some(shutdown) = self.shutdown.take() {
            shutdown.cancel();
        }
        if let Some(task) = self.task.take() {
            task.await
                .map_err(|e| Error::Connector(format!("interval task failed: {}", e)))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use binding_core::{stage_fn, Response};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn test_ticks_until_stopped() {
        let mut source = IntervalSource::new();
        let spec = ConnectorSpec::new("interval")
            .with_property("interval_milliseconds", "100")
            .with_property("data", "tick")
            .with_property("metadata", r#"{"origin": "timer"}"#);
        source
            .init(&spec, &ConnectorContext::new("b1", CancellationToken::new()))
            .await
            .unwrap();

        let count = Arc::new(AtomicU32::new(0));
        let c = count.clone();
        let sink = stage_fn(move |req: Request| {
            let c = c.clone();
            async move {
                assert_eq!(req.data, "tick");
                assert_eq!(req.metadata["origin"], "timer");
                c.fetch_add(1, Ordering::SeqCst);
                Ok(Response::default())
            }
        });
        source.start(sink, CancellationToken::new()).await.unwrap();

        tokio::time::sleep(Duration::from_millis(450)).await;
        source.stop().await.unwrap();

        let ticks = count.load(Ordering::SeqCst);
        assert!((4..=5).contains(&ticks), "ticks {}", ticks);
    }

    #[tokio::test]
    async fn test_rejects_zero_interval() {
        let mut source = IntervalSource::new();
        let spec = ConnectorSpec::new("interval").with_property("interval_milliseconds", "0");
        let ctx = ConnectorContext::new("b1", CancellationToken::new());
        assert!(source.init(&spec, &ctx).await.is_err());
    }
}
