//! Pharmacist directory and profile updates

use axum::{extract::State, response::Response, Json};
use serde_json::Value as JsonValue;

use crate::{
    api::{
        extractors::{EntityId, ListParams, ValidatedJson},
        handlers::{doctors::PUBLIC_USER_FIELDS, list_response, one_or_404},
    },
    auth::AuthenticatedPrincipal,
    db::{pharmacists::PHARMACISTS, to_document},
    models::{PharmacistUpdate, Role},
    state::AppState,
    Error, Result,
};

/// GET /api/pharmacists
pub async fn list_pharmacists(
    State(state): State<AppState>,
    AuthenticatedPrincipal(_principal): AuthenticatedPrincipal,
    params: ListParams,
) -> Result<Response> {
    let query = state
        .repos
        .pharmacists
        .find()
        .populate_select("user", PUBLIC_USER_FIELDS);
    let query = params.apply(query, &state.config.api)?;
    list_response(query, &state.db_pool).await
}

/// GET /api/pharmacists/:id
pub async fn get_pharmacist(
    State(state): State<AppState>,
    AuthenticatedPrincipal(_principal): AuthenticatedPrincipal,
    EntityId(id): EntityId,
) -> Result<Json<JsonValue>> {
    let query = state
        .repos
        .pharmacists
        .find_by_id(id)
        .populate_select("user", PUBLIC_USER_FIELDS);
    one_or_404(query, &state.db_pool, id).await
}

/// PATCH /api/pharmacists/me
pub async fn update_me(
    State(state): State<AppState>,
    AuthenticatedPrincipal(principal): AuthenticatedPrincipal,
    ValidatedJson(patch): ValidatedJson<PharmacistUpdate>,
) -> Result<Json<JsonValue>> {
    principal.require_role(&[Role::Pharmacist])?;

    let pharmacists = &state.repos.pharmacists;
    let profile = pharmacists
        .get_by_user(principal.user_id)
        .await?
        .ok_or_else(|| Error::NotFound("pharmacist profile".to_string()))?;
    let updated = pharmacists
        .update(profile.id, &patch)
        .await?
        .ok_or_else(|| Error::not_found(PHARMACISTS.name, profile.id))?;
    Ok(Json(to_document(&PHARMACISTS, &updated)?))
}
