//! Liveness and service banner endpoints

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;

use crate::state::AppState;

pub const SERVICE_NAME: &str = "carebook";

/// GET /health
///
/// 200 while the database answers, 503 otherwise.
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    match state.ping_database().await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({
                "status": "ok",
                "service": SERVICE_NAME,
                "version": env!("CARGO_PKG_VERSION"),
                "database": "up"
            })),
        ),
        Err(e) => {
            tracing::warn!(error = %e, "Health check failed: database unreachable");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "status": "degraded",
                    "service": SERVICE_NAME,
                    "version": env!("CARGO_PKG_VERSION"),
                    "database": "down"
                })),
            )
        }
    }
}

/// GET /
pub async fn root() -> impl IntoResponse {
    Json(json!({
        "server": "CareBook API",
        "version": env!("CARGO_PKG_VERSION"),
        "api": "/api",
        "status": "running"
    }))
}
