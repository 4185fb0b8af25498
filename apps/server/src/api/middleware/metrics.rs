//! Per-request HTTP metrics

use axum::{
    extract::{MatchedPath, Request},
    middleware::Next,
    response::Response,
};
use prometheus::IntGauge;
use std::time::Instant;

use crate::metrics::{
    method_label, sanitize_path, HTTP_REQUESTS_IN_FLIGHT, HTTP_REQUESTS_TOTAL,
    HTTP_REQUEST_DURATION_SECONDS, HTTP_RESPONSE_SIZE_BYTES,
};

/// Decrements the in-flight gauge even when the request future is dropped.
struct InFlight(IntGauge);

impl InFlight {
    fn enter(gauge: IntGauge) -> Self {
        gauge.inc();
        Self(gauge)
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.dec();
    }
}

pub async fn metrics_middleware(req: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = method_label(req.method().as_str());
    let route = sanitize_path(req.extensions().get::<MatchedPath>().map(MatchedPath::as_str))
        .to_owned();
    let route = route.as_str();

    let response = {
        let _in_flight =
            InFlight::enter(HTTP_REQUESTS_IN_FLIGHT.with_label_values(&[method, route]));
        next.run(req).await
    };

    let status = response.status().as_str().to_owned();
    let status = status.as_str();
    HTTP_REQUESTS_TOTAL
        .with_label_values(&[method, route, status])
        .inc();
    HTTP_REQUEST_DURATION_SECONDS
        .with_label_values(&[method, route])
        .observe(start.elapsed().as_secs_f64());

    let body_len = response
        .headers()
        .get(axum::http::header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<f64>().ok());
    if let Some(len) = body_len {
        HTTP_RESPONSE_SIZE_BYTES
            .with_label_values(&[method, route, status])
            .observe(len);
    }

    response
}
