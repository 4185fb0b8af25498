//! Operational routes outside `/api`: health, banner and Prometheus metrics

use crate::api::handlers::{health, metrics};
use crate::state::AppState;
use axum::{http::StatusCode, routing::get, Router};

pub fn service_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health::health_check))
        .route("/", get(health::root))
        // 204 keeps browsers from logging a 404
        .route("/favicon.ico", get(|| async { StatusCode::NO_CONTENT }))
        .route("/metrics", get(metrics::metrics_handler))
}
