//! Local status endpoint: `/health` and `/metrics`

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

use axum::Router;
use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use metrics_exporter_prometheus::PrometheusHandle;

/// Shared state for the status handlers
#[derive(Clone)]
pub struct StatusState {
    pub prometheus: PrometheusHandle,
    pub started_at: Instant,
    pub accounts_total: usize,
    pub accounts_running: Arc<AtomicUsize>,
}

/// Build the status router with a concurrency limit.
pub fn build_router(state: StatusState, max_connections: usize) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .layer(tower::limit::ConcurrencyLimitLayer::new(max_connections))
        .with_state(state)
}

/// 200 while at least one account is farming, 503 once all have stopped.
async fn health_handler(State(state): State<StatusState>) -> impl IntoResponse {
    let running = state.accounts_running.load(Ordering::Relaxed);
    let (status_code, status) = if running > 0 {
        (axum::http::StatusCode::OK, "healthy")
    } else {
        (axum::http::StatusCode::SERVICE_UNAVAILABLE, "degraded")
    };
    let body = serde_json::json!({
        "status": status,
        "accounts": state.accounts_total,
        "accounts_running": running,
        "uptime_seconds": state.started_at.elapsed().as_secs(),
    });

    (
        status_code,
        [(axum::http::header::CONTENT_TYPE, "application/json")],
        body.to_string(),
    )
}

/// Prometheus metrics endpoint in text exposition format.
async fn metrics_handler(State(state): State<StatusState>) -> impl IntoResponse {
    (
        axum::http::StatusCode::OK,
        [(
            axum::http::header::CONTENT_TYPE,
            "text/plain; version=0.0.4; charset=utf-8",
        )],
        state.prometheus.render(),
    )
}
