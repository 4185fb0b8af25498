//! Request handlers for API endpoints
//!
//! Handlers check the caller's role and ownership, validate input, and make
//! one or two repository calls. Reads go through the document query layer so
//! responses carry the legacy field aliases.

pub mod appointments;
pub mod auth;
pub mod doctors;
pub mod health;
pub mod lab_bookings;
pub mod lab_techniques;
pub mod metrics;
pub mod pharmacists;
pub mod prescriptions;
pub mod users;

use axum::{
    http::{HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use sqlx::PgPool;

use crate::{db::FindQuery, Error, Result};

const TOTAL_COUNT_HEADER: HeaderName = HeaderName::from_static("x-total-count");

/// Run a list query and return the documents as a JSON array, with the
/// unpaged match count in `x-total-count`.
pub(crate) async fn list_response(query: FindQuery, pool: &PgPool) -> Result<Response> {
    let docs = query.exec(pool).await?;
    let total = query.count(pool).await?;

    let mut response = Json(JsonValue::Array(docs)).into_response();
    response
        .headers_mut()
        .insert(TOTAL_COUNT_HEADER, HeaderValue::from(total));
    Ok(response)
}

/// The first document of `query`, or 404 for `entity` / `id`.
pub(crate) async fn one_or_404(
    query: FindQuery,
    pool: &PgPool,
    id: uuid::Uuid,
) -> Result<Json<JsonValue>> {
    let entity = query.entity().name;
    query
        .exec_one(pool)
        .await?
        .map(Json)
        .ok_or_else(|| Error::not_found(entity, id))
}

pub(crate) fn created(doc: JsonValue) -> Response {
    (StatusCode::CREATED, Json(doc)).into_response()
}

pub(crate) fn ensure_future(scheduled_at: DateTime<Utc>) -> Result<()> {
    if scheduled_at <= Utc::now() {
        return Err(Error::Validation(
            "scheduled_at must be in the future".to_string(),
        ));
    }
    Ok(())
}
