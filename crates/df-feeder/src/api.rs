//! Operational HTTP API: health probes and Prometheus metrics

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Clone)]
pub struct ApiState {
    /// Set while the listener is consuming
    pub ready: Arc<AtomicBool>,
    pub metrics: Option<PrometheusHandle>,
}

impl ApiState {
    pub fn new(ready: Arc<AtomicBool>, metrics: Option<PrometheusHandle>) -> Self {
        Self { ready, metrics }
    }

    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// UP or DOWN
    pub status: String,
    pub version: String,
}

#[derive(Debug, Serialize)]
pub struct ProbeResponse {
    pub status: String,
}

pub fn create_router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/health/live", get(liveness_probe))
        .route("/health/ready", get(readiness_probe))
        .route("/metrics", get(metrics_handler))
        .with_state(state)
}

async fn health_handler(State(state): State<ApiState>) -> Json<HealthResponse> {
    let status = if state.is_ready() { "UP" } else { "DOWN" };
    Json(HealthResponse {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

async fn liveness_probe() -> Json<ProbeResponse> {
    Json(ProbeResponse { status: "LIVE".to_string() })
}

async fn readiness_probe(State(state): State<ApiState>) -> Response {
    if state.is_ready() {
        (StatusCode::OK, Json(ProbeResponse { status: "READY".to_string() })).into_response()
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ProbeResponse { status: "NOT_READY".to_string() }),
        )
            .into_response()
    }
}

async fn metrics_handler(State(state): State<ApiState>) -> Response {
    let body = state.metrics.as_ref().map(|h| h.render()).unwrap_or_default();
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        body,
    )
        .into_response()
}
