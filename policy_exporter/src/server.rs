use crate::exporters::{JsonExporter, MetricsSnapshot, PrometheusExporter};
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use policy_core::{MetricsState, UpdateReport};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

#[derive(Clone)]
struct AppState {
    start_time: Instant,
    metrics: Arc<MetricsState>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub initialized: bool,
    pub refresh_cycles: u64,
    pub uptime_seconds: u64,
}

pub fn router(metrics: Arc<MetricsState>) -> Router {
    let state = AppState {
        start_time: Instant::now(),
        metrics,
    };

    Router::new()
        .route("/metrics", get(metrics_text))
        .route("/metrics.json", get(metrics_json))
        .route("/health", get(health_check))
        .route("/refresh", post(refresh))
        .with_state(state)
}

/// Serves the exporter on `addr` until `token` is cancelled.
pub async fn serve(
    addr: SocketAddr,
    metrics: Arc<MetricsState>,
    token: CancellationToken,
) -> anyhow::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    serve_with_listener(listener, metrics, token).await
}

pub async fn serve_with_listener(
    listener: TcpListener,
    metrics: Arc<MetricsState>,
    token: CancellationToken,
) -> anyhow::Result<()> {
    info!("Starting Policy Metrics Exporter on {}", listener.local_addr()?);
    info!("Endpoints:");
    info!("  GET  /metrics       - Prometheus text exposition");
    info!("  GET  /metrics.json  - JSON snapshot");
    info!("  GET  /health        - Health check");
    info!("  POST /refresh       - Re-apply metric values now");

    axum::serve(listener, router(metrics))
        .with_graceful_shutdown(async move { token.cancelled().await })
        .await?;

    info!("Exporter stopped");
    Ok(())
}

async fn metrics_text(State(state): State<AppState>) -> Response {
    match PrometheusExporter::format(&state.metrics) {
        Ok(body) => (
            [(header::CONTENT_TYPE, PrometheusExporter::CONTENT_TYPE)],
            body,
        )
            .into_response(),
        Err(e) => {
            error!("Failed to encode metrics: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

async fn metrics_json(State(state): State<AppState>) -> Result<Json<MetricsSnapshot>, Response> {
    JsonExporter::snapshot(&state.metrics).map(Json).map_err(|e| {
        error!("Failed to snapshot metrics: {}", e);
        (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
    })
}

async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        initialized: state.metrics.is_initialized(),
        refresh_cycles: state.metrics.cycles(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
    })
}

async fn refresh(State(state): State<AppState>) -> Json<UpdateReport> {
    info!("Refresh requested over HTTP");
    Json(state.metrics.initialize_and_update().await)
}
