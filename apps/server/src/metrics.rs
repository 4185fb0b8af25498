//! Prometheus metrics for the CareBook API.

use lazy_static::lazy_static;
use prometheus::{
    register_histogram_vec, register_int_counter_vec, register_int_gauge_vec, HistogramVec,
    IntCounterVec, IntGaugeVec,
};

lazy_static! {
    // HTTP

    /// Total HTTP requests by method, path, and status
    pub static ref HTTP_REQUESTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "carebook_http_requests_total",
        "Total number of HTTP requests",
        &["method", "path", "status"]
    )
    .expect("Failed to register HTTP_REQUESTS_TOTAL");

    pub static ref HTTP_REQUEST_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        "carebook_http_request_duration_seconds",
        "HTTP request duration in seconds",
        &["method", "path"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]
    )
    .expect("Failed to register HTTP_REQUEST_DURATION_SECONDS");

    pub static ref HTTP_REQUESTS_IN_FLIGHT: IntGaugeVec = register_int_gauge_vec!(
        "carebook_http_requests_in_flight",
        "Number of HTTP requests currently being processed",
        &["method", "path"]
    )
    .expect("Failed to register HTTP_REQUESTS_IN_FLIGHT");

    pub static ref HTTP_RESPONSE_SIZE_BYTES: HistogramVec = register_histogram_vec!(
        "carebook_http_response_size_bytes",
        "HTTP response size in bytes",
        &["method", "path", "status"],
        vec![100.0, 1_000.0, 10_000.0, 100_000.0, 1_000_000.0]
    )
    .expect("Failed to register HTTP_RESPONSE_SIZE_BYTES");

    // Database

    /// Query duration per entity and operation (find, register, create, ...)
    pub static ref DB_QUERY_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        "carebook_db_query_duration_seconds",
        "Database query duration in seconds",
        &["entity", "operation"],
        vec![0.0001, 0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0]
    )
    .expect("Failed to register DB_QUERY_DURATION_SECONDS");

    /// Pool connections by state (`open`, `idle`), refreshed on scrape
    pub static ref DB_POOL_CONNECTIONS: IntGaugeVec = register_int_gauge_vec!(
        "carebook_db_pool_connections",
        "Database pool connections",
        &["state"]
    )
    .expect("Failed to register DB_POOL_CONNECTIONS");

    // Domain

    pub static ref AUTH_FAILURES_TOTAL: IntCounterVec = register_int_counter_vec!(
        "carebook_auth_failures_total",
        "Rejected logins and bearer tokens",
        &["reason"]
    )
    .expect("Failed to register AUTH_FAILURES_TOTAL");

    pub static ref BOOKINGS_CREATED_TOTAL: IntCounterVec = register_int_counter_vec!(
        "carebook_bookings_created_total",
        "Appointments and lab bookings created",
        &["kind"]
    )
    .expect("Failed to register BOOKINGS_CREATED_TOTAL");
}

/// Path label for requests no route matched.
pub const UNMATCHED_PATH: &str = "unmatched";

/// Route template used as the `path` label.
///
/// Labels come from the matched route (`/api/appointments/:id/status`), never
/// from the raw URI, so unknown paths and malformed ids cannot add series.
pub fn sanitize_path(matched_route: Option<&str>) -> &str {
    matched_route.unwrap_or(UNMATCHED_PATH)
}

/// `method` label; anything outside the verbs the API serves is `OTHER`.
pub fn method_label(method: &str) -> &'static str {
    match method {
        "GET" => "GET",
        "HEAD" => "HEAD",
        "POST" => "POST",
        "PUT" => "PUT",
        "PATCH" => "PATCH",
        "DELETE" => "DELETE",
        "OPTIONS" => "OPTIONS",
        _ => "OTHER",
    }
}

/// Collection name for an `/api/...` path (`appointments`, `lab-bookings`, ...).
pub fn extract_collection(path: &str) -> Option<&str> {
    let rest = path.strip_prefix("/api/")?;
    rest.split('/').find(|s| !s.is_empty())
}

pub fn extract_operation(method: &str, path: &str) -> Option<&'static str> {
    let rest = path.strip_prefix("/api/")?;
    let depth = rest.split('/').filter(|s| !s.is_empty()).count();

    match (method, depth) {
        ("GET", 1) => Some("list"),
        ("GET", _) => Some("read"),
        ("POST", _) => Some("create"),
        ("PATCH", 3) => Some("transition"),
        ("PATCH", _) | ("PUT", _) => Some("update"),
        ("DELETE", _) => Some("delete"),
        _ => None,
    }
}
