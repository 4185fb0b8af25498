//! Doctor directory and profile updates

use axum::{extract::State, response::Response, Json};
use serde_json::Value as JsonValue;

use crate::{
    api::{
        extractors::{EntityId, ListParams, ValidatedJson},
        handlers::{list_response, one_or_404},
    },
    auth::AuthenticatedPrincipal,
    db::{doctors::DOCTORS, to_document},
    models::{DoctorUpdate, Role},
    state::AppState,
    Error, Result,
};

/// Fields of the linked user shown in the public directory.
pub(crate) const PUBLIC_USER_FIELDS: &str = "name email phone";

/// GET /api/doctors
pub async fn list_doctors(
    State(state): State<AppState>,
    params: ListParams,
) -> Result<Response> {
    let query = state
        .repos
        .doctors
        .find()
        .populate_select("user", PUBLIC_USER_FIELDS);
    let query = params.apply(query, &state.config.api)?;
    list_response(query, &state.db_pool).await
}

/// GET /api/doctors/:id
pub async fn get_doctor(
    State(state): State<AppState>,
    EntityId(id): EntityId,
) -> Result<Json<JsonValue>> {
    let query = state
        .repos
        .doctors
        .find_by_id(id)
        .populate_select("user", PUBLIC_USER_FIELDS);
    one_or_404(query, &state.db_pool, id).await
}

/// PATCH /api/doctors/me
pub async fn update_me(
    State(state): State<AppState>,
    AuthenticatedPrincipal(principal): AuthenticatedPrincipal,
    ValidatedJson(patch): ValidatedJson<DoctorUpdate>,
) -> Result<Json<JsonValue>> {
    principal.require_role(&[Role::Doctor])?;

    let doctors = &state.repos.doctors;
    let profile = doctors
        .get_by_user(principal.user_id)
        .await?
        .ok_or_else(|| Error::NotFound("doctor profile".to_string()))?;
    let updated = doctors
        .update(profile.id, &patch)
        .await?
        .ok_or_else(|| Error::not_found(DOCTORS.name, profile.id))?;
    Ok(Json(to_document(&DOCTORS, &updated)?))
}
