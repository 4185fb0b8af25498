//! Custom Axum extractors.
//!
//! Every rejection is a [`crate::Error`], so malformed bodies, ids and
//! query strings produce the same JSON error shape as handler failures.

use axum::{
    async_trait,
    extract::{FromRequest, FromRequestParts, Path, Query, Request},
    http::request::Parts,
    Json,
};
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use uuid::Uuid;
use validator::Validate;

use crate::{
    config::ApiConfig,
    db::{Filter, FindQuery},
    Error, Result,
};

/// JSON body that has passed `validator` checks.
#[derive(Debug, Clone)]
pub struct ValidatedJson<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = Error;

    async fn from_request(req: Request, state: &S) -> Result<Self> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| Error::Validation(rejection.body_text()))?;
        value.validate()?;
        Ok(Self(value))
    }
}

/// The `:id` path segment parsed as a UUID.
#[derive(Debug, Clone, Copy)]
pub struct EntityId(pub Uuid);

#[async_trait]
impl<S> FromRequestParts<S> for EntityId
where
    S: Send + Sync,
{
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self> {
        let Path(raw) = Path::<String>::from_request_parts(parts, state)
            .await
            .map_err(|rejection| Error::Validation(rejection.body_text()))?;
        Uuid::parse_str(&raw)
            .map(EntityId)
            .map_err(|_| Error::Validation(format!("'{raw}' is not a valid id")))
    }
}

/// Query-string controls for list endpoints.
///
/// `sort`, `select`, `limit` and `skip` steer the query; every other key is
/// a filter (`?status=pending&scheduled_at[$gte]=2024-05-01`).
#[derive(Debug, Clone, Default)]
pub struct ListParams {
    pub sort: Option<String>,
    pub select: Option<String>,
    pub limit: Option<i64>,
    pub skip: Option<i64>,
    params: HashMap<String, String>,
}

impl ListParams {
    pub fn from_query(params: HashMap<String, String>) -> Result<Self> {
        Ok(Self {
            sort: non_empty(params.get("sort")),
            select: non_empty(params.get("select")),
            limit: parse_count(&params, "limit")?,
            skip: parse_count(&params, "skip")?,
            params,
        })
    }

    /// Apply filters, sort, projection and paging to `query`.
    ///
    /// `limit` defaults to `api.default_page_size` and is capped at
    /// `api.max_page_size`.
    pub fn apply(&self, mut query: FindQuery, api: &ApiConfig) -> Result<FindQuery> {
        let filter = Filter::from_query_params(query.entity(), &self.params)?;
        query = query.filter(filter);
        if let Some(sort) = &self.sort {
            query = query.sort(sort);
        }
        if let Some(select) = &self.select {
            query = query.select(select);
        }
        Ok(query
            .limit(self.page_limit(api))
            .skip(self.skip.unwrap_or(0)))
    }

    pub fn page_limit(&self, api: &ApiConfig) -> i64 {
        self.limit
            .unwrap_or(api.default_page_size)
            .clamp(1, api.max_page_size)
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for ListParams
where
    S: Send + Sync,
{
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self> {
        let Query(params) = Query::<HashMap<String, String>>::from_request_parts(parts, state)
            .await
            .map_err(|rejection| Error::InvalidQuery(rejection.body_text()))?;
        Self::from_query(params)
    }
}

fn non_empty(value: Option<&String>) -> Option<String> {
    value
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(String::from)
}

fn parse_count(params: &HashMap<String, String>, key: &str) -> Result<Option<i64>> {
    match params.get(key).map(|v| v.trim()) {
        None | Some("") => Ok(None),
        Some(raw) => match raw.parse::<i64>() {
            Ok(n) if n >= 0 => Ok(Some(n)),
            _ => Err(Error::InvalidQuery(format!(
                "'{key}' must be a non-negative integer"
            ))),
        },
    }
}
