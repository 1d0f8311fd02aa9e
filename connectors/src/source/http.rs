use async_trait::async_trait;
use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use binding_core::{
    ConnectorContext, ConnectorSpec, Error, Request, Response, Result, SharedStage, Source,
};
use bytes::Bytes;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, Instrument, Span};

struct HttpState {
    downstream: SharedStage,
    raw: bool,
    cancel: CancellationToken,
}

/// Accepts `POST /` and hands the body to the chain
///
/// Properties: `address` (`host:port`, required) and `raw` (`true` to treat
/// the body as payload bytes instead of a JSON request envelope).
#[derive(Default)]
pub struct HttpSource {
    address: Option<SocketAddr>,
    raw: bool,
    span: Option<Span>,
    local_addr: Option<SocketAddr>,
    shutdown: Option<CancellationToken>,
    server: Option<JoinHandle<()>>,
}

impl HttpSource {
    /// Create source
    pub fn new() -> Self {
        Self::default()
    }

    /// Bound address once started
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }
}

async fn receive(State(state): State<Arc<HttpState>>, body: Bytes) -> Json<Response> {
    let request = if state.raw {
        Ok(Request::new(body))
    } else {
        Request::from_bytes(&body)
    };

    let response = match request {
        Ok(request) => match state.downstream.invoke(&state.cancel, request).await {
            Ok(response) => response,
            Err(e) => Response::from_error(&e),
        },
        Err(e) => Response::from_error(&e),
    };
    Json(response)
}

#[async_trait]
impl Source for HttpSource {
    fn kind(&self) -> &str {
        "http"
    }

    async fn init(&mut self, spec: &ConnectorSpec, ctx: &ConnectorContext) -> Result<()> {
        let address = spec
            .properties
            .get("address")
            .ok_or_else(|| Error::config("address", "required"))?;
        let address = address
            .trim()
            .parse::<SocketAddr>()
            .map_err(|e| Error::config("address", format!("{:?}: {}", address, e)))?;

        self.raw = spec
            .properties
            .get("raw")
            .map(|v| v.trim().eq_ignore_ascii_case("true"))
            .unwrap_or(false);
        self.address = Some(address);
        self.span = Some(ctx.span.clone());
        Ok(())
    }

    async fn start(&mut self, downstream: SharedStage, cancel: CancellationToken) -> Result<()> {
        let address = self
            .address
            .ok_or_else(|| Error::InvalidState("http source not initialized".into()))?;
        let listener = TcpListener::bind(address).await?;
        let local_addr = listener.local_addr()?;

        let shutdown = cancel.child_token();
        let state = Arc::new(HttpState {
            downstream,
            raw: self.raw,
            cancel: shutdown.clone(),
        });
        let app = Router::new().route("/", post(receive)).with_state(state);

        let token = shutdown.clone();
        let span = self.span.clone().unwrap_or_else(Span::current);
        let server = tokio::spawn(
            async move {
                info!(address = %local_addr, "HTTP source listening");
                let result = axum::serve(listener, app)
                    .with_graceful_shutdown(async move { token.cancelled().await })
                    .await;
                if let Err(e) = result {
                    error!(error = %e, "HTTP source server failed");
                }
            }
            .instrument(span),
        );

        self.local_addr = Some(local_addr);
        self.shutdown = Some(shutdown);
        self.server = Some(server);
        Ok(())
    }

    async fn stop(&mut self) -> Result<()> {
        if let Some(shutdown) = self.shutdown.take() {
            shutdown.cancel();
        }
        if let Some(server) = self.server.take() {
            server
                .await
                .map_err(|e| Error::Connector(format!("http source task failed: {}", e)))?;
        }
        Ok(())
    }
}
