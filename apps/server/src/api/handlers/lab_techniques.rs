//! Lab technique catalogue

use axum::{extract::State, http::StatusCode, response::Response, Json};
use serde_json::Value as JsonValue;

use crate::{
    api::{
        extractors::{EntityId, ListParams, ValidatedJson},
        handlers::{created, list_response, one_or_404},
    },
    auth::AuthenticatedPrincipal,
    db::{lab_techniques::LAB_TECHNIQUES, to_document},
    models::{LabTechniqueUpdate, NewLabTechnique, Role},
    state::AppState,
    Error, Result,
};

/// GET /api/lab-techniques
pub async fn list_lab_techniques(
    State(state): State<AppState>,
    params: ListParams,
) -> Result<Response> {
    let query = params.apply(state.repos.lab_techniques.find(), &state.config.api)?;
    list_response(query, &state.db_pool).await
}

/// GET /api/lab-techniques/:id
pub async fn get_lab_technique(
    State(state): State<AppState>,
    EntityId(id): EntityId,
) -> Result<Json<JsonValue>> {
    one_or_404(state.repos.lab_techniques.find_by_id(id), &state.db_pool, id).await
}

/// POST /api/lab-techniques
pub async fn create_lab_technique(
    State(state): State<AppState>,
    AuthenticatedPrincipal(principal): AuthenticatedPrincipal,
    ValidatedJson(new): ValidatedJson<NewLabTechnique>,
) -> Result<Response> {
    principal.require_role(&[Role::Admin])?;
    let technique = state.repos.lab_techniques.create(&new).await?;
    tracing::info!(technique_id = %technique.id, name = %technique.name, "Lab technique created");
    Ok(created(to_document(&LAB_TECHNIQUES, &technique)?))
}

/// PATCH /api/lab-techniques/:id
pub async fn update_lab_technique(
    State(state): State<AppState>,
    AuthenticatedPrincipal(principal): AuthenticatedPrincipal,
    EntityId(id): EntityId,
    ValidatedJson(patch): ValidatedJson<LabTechniqueUpdate>,
) -> Result<Json<JsonValue>> {
    principal.require_role(&[Role::Admin])?;
    let technique = state
        .repos
        .lab_techniques
        .update(id, &patch)
        .await?
        .ok_or_else(|| Error::not_found(LAB_TECHNIQUES.name, id))?;
    Ok(Json(to_document(&LAB_TECHNIQUES, &technique)?))
}

/// DELETE /api/lab-techniques/:id
pub async fn delete_lab_technique(
    State(state): State<AppState>,
    AuthenticatedPrincipal(principal): AuthenticatedPrincipal,
    EntityId(id): EntityId,
) -> Result<StatusCode> {
    principal.require_role(&[Role::Admin])?;
    if !state.repos.lab_techniques.delete(id).await? {
        return Err(Error::not_found(LAB_TECHNIQUES.name, id));
    }
    Ok(StatusCode::NO_CONTENT)
}
