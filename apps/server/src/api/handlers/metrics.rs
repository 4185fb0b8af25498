//! `GET /metrics`

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use prometheus::{Encoder, TextEncoder};

use crate::{metrics::DB_POOL_CONNECTIONS, state::AppState};

const PROMETHEUS_TEXT: &str = "text/plain; version=0.0.4; charset=utf-8";

/// Refresh the pool gauges, then render the default registry.
pub async fn metrics_handler(State(state): State<AppState>) -> Response {
    DB_POOL_CONNECTIONS
        .with_label_values(&["open"])
        .set(i64::from(state.db_pool.size()));
    DB_POOL_CONNECTIONS
        .with_label_values(&["idle"])
        .set(state.db_pool.num_idle() as i64);

    let mut body = Vec::new();
    if let Err(e) = TextEncoder::new().encode(&prometheus::gather(), &mut body) {
        tracing::error!(error = %e, "Metrics encoding failed");
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }
    ([(header::CONTENT_TYPE, PROMETHEUS_TEXT)], body).into_response()
}
