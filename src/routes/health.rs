// ============================================================================
// Health and Metrics Routes
// ============================================================================
//
// Endpoints:
// - GET /health - Storage and node directory reachability
// - GET /metrics - Prometheus metrics
//
// ============================================================================

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::{json, Value};
use std::sync::Arc;

use super::PushContext;
use crate::metrics;

/// GET /health
/// 200 when every backend answers, 503 with per-backend status otherwise
pub async fn health_check(State(context): State<Arc<PushContext>>) -> impl IntoResponse {
    let backends = context.router.backends();
    let (storage_ok, storage) = component_status("storage", backends.store.ping().await);
    let (router_ok, router) = component_status("router", backends.nodes.ping().await);

    let healthy = storage_ok && router_ok;
    let status = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(json!({
            "status": if healthy { "OK" } else { "NOT OK" },
            "version": env!("CARGO_PKG_VERSION"),
            "storage": storage,
            "router": router,
        })),
    )
}

fn component_status(component: &str, result: anyhow::Result<()>) -> (bool, Value) {
    match result {
        Ok(()) => (true, json!({"status": "OK"})),
        Err(e) => {
            // Backend details stay in the logs
            tracing::error!(component, error = %format!("{:#}", e), "Health check failed");
            (false, json!({"status": "NOT OK", "error": "Internal error"}))
        }
    }
}

/// GET /metrics
/// Prometheus metrics endpoint
pub async fn metrics() -> impl IntoResponse {
    match metrics::gather_metrics() {
        Ok(metrics_data) => (
            StatusCode::OK,
            [("Content-Type", "text/plain; version=0.0.4")],
            metrics_data,
        ),
        Err(e) => {
            tracing::error!("Failed to gather metrics: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [("Content-Type", "text/plain")],
                "Internal Server Error".to_string(),
            )
        }
    }
}
