//! Health check endpoints.

use axum::{extract::State, http::StatusCode, Json};
use queue_store::health::{check_connection, queue_depth};
use telemetry::{health, metrics, MetricsSnapshot};

use crate::response::HealthResponse;
use crate::state::AppState;

/// GET /health - Full health check.
///
/// Probes the store on every call; AI and vault health come from the
/// scheduler's last sweep.
pub async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let connected = check_connection(state.store.as_ref()).await;
    health().store.record(connected, "queue store unreachable");

    let counts = if connected {
        queue_depth(state.store.as_ref()).await
    } else {
        None
    };
    if let Some(counts) = counts {
        metrics().queue_depth.set(counts.pending);
    }

    let report = health().report();
    Json(HealthResponse {
        status: report.status.as_str().to_string(),
        store_connected: connected,
        ai_available: health().ai.is_healthy(),
        vault_available: health().vault.is_healthy(),
        queue_depth: metrics().queue_depth.get(),
        counts,
    })
}

/// GET /health/ready - Readiness probe (can accept traffic).
pub async fn ready_handler() -> StatusCode {
    if health().is_ready() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

/// GET /health/live - Liveness probe (service is running).
pub async fn live_handler() -> StatusCode {
    if health().is_alive() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

/// GET /metrics - In-process counters.
pub async fn metrics_handler() -> Json<MetricsSnapshot> {
    Json(metrics().snapshot())
}
