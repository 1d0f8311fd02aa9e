//! Administrative HTTP API
//!
//! ```text
//! GET  /health        liveness
//! GET  /ready         200 when the service is running, 503 otherwise
//! POST /send/request  {binding, payload} -> response envelope
//! GET  /status        binding statuses
//! GET  /stats         metrics reports
//! GET  /metrics       Prometheus exposition
//! ```

use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response as HttpResponse};
use axum::routing::{get, post};
use axum::{Json, Router};
use binding_core::{BindingService, Error, Report, Response, SendRequest, Status};
use serde_json::json;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    /// Binding service of the current generation
    pub service: Arc<BindingService>,
}

/// Errors surfaced as HTTP failures
pub enum ApiError {
    /// Metrics could not be rendered
    Metrics(Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> HttpResponse {
        let (status, message) = match self {
            ApiError::Metrics(e) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to export metrics: {}", e),
            ),
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

/// Build the API router
pub fn router(service: Arc<BindingService>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/ready", get(ready))
        .route("/send/request", post(send_request))
        .route("/status", get(status))
        .route("/stats", get(stats))
        .route("/metrics", get(metrics))
        .layer(TraceLayer::new_for_http())
        .with_state(AppState { service })
}

/// Serve the API on `listener` until `shutdown` fires
pub async fn serve(
    listener: TcpListener,
    service: Arc<BindingService>,
    shutdown: CancellationToken,
) -> std::io::Result<()> {
    info!(address = %listener.local_addr()?, "API listening");
    axum::serve(listener, router(service))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

async fn ready(State(state): State<AppState>) -> StatusCode {
    if state.service.is_ready() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

async fn send_request(State(state): State<AppState>, body: Bytes) -> Json<Response> {
    let response = match serde_json::from_slice::<SendRequest>(&body) {
        Ok(body) => state.service.send_body(body).await,
        Err(e) => Response::from_error(&Error::from(e)),
    };
    Json(response)
}

async fn status(State(state): State<AppState>) -> Json<Vec<Status>> {
    Json(state.service.status())
}

async fn stats(State(state): State<AppState>) -> Json<Vec<Report>> {
    Json(state.service.stats())
}

async fn metrics(State(state): State<AppState>) -> Result<String, ApiError> {
    state.service.exporter().gather_text().map_err(|e| {
        error!(error = %e, "Failed to export metrics");
        ApiError::Metrics(e)
    })
}
