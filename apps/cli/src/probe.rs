//! One health probe against the server's `/health` endpoint

use reqwest::{Client, StatusCode};
use serde_json::Value as JsonValue;
use std::time::{Duration, Instant};

/// Outcome of a single probe.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeResult {
    /// HTTP status, `None` when the request itself failed.
    pub status: Option<u16>,
    pub latency: Duration,
    /// `database` field of the health body, when present.
    pub database: Option<String>,
    pub healthy: bool,
    pub error: Option<String>,
}

/// Healthy means a 2xx response whose JSON body says `"status": "ok"`.
pub fn evaluate(status: StatusCode, body: &[u8]) -> (bool, Option<String>) {
    let parsed: Option<JsonValue> = serde_json::from_slice(body).ok();
    let database = parsed
        .as_ref()
        .and_then(|v| v.get("database"))
        .and_then(JsonValue::as_str)
        .map(str::to_string);
    let ok_body = parsed
        .as_ref()
        .and_then(|v| v.get("status"))
        .and_then(JsonValue::as_str)
        == Some("ok");
    (status.is_success() && ok_body, database)
}

/// When a polling loop ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StopRule {
    /// Probes to run; 0 runs until interrupted.
    pub attempts: u64,
    pub until_healthy: bool,
}

impl StopRule {
    /// `attempt` is 1-based.
    pub fn should_stop(&self, attempt: u64, healthy: bool) -> bool {
        (self.until_healthy && healthy) || (self.attempts > 0 && attempt >= self.attempts)
    }
}

pub async fn probe(client: &Client, url: &str) -> ProbeResult {
    let start = Instant::now();
    let response = match client.get(url).send().await {
        Ok(response) => response,
        Err(e) => {
            return ProbeResult {
                status: None,
                latency: start.elapsed(),
                database: None,
                healthy: false,
                error: Some(e.to_string()),
            }
        }
    };

    let status = response.status();
    match response.bytes().await {
        Ok(body) => {
            let (healthy, database) = evaluate(status, &body);
            ProbeResult {
                status: Some(status.as_u16()),
                latency: start.elapsed(),
                database,
                healthy,
                error: None,
            }
        }
        Err(e) => ProbeResult {
            status: Some(status.as_u16()),
            latency: start.elapsed(),
            database: None,
            healthy: false,
            error: Some(e.to_string()),
        },
    }
}
