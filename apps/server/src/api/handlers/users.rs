//! User administration and self-service profile updates

use axum::{extract::State, http::StatusCode, response::Response, Json};
use serde_json::Value as JsonValue;

use crate::{
    api::{
        extractors::{EntityId, ListParams, ValidatedJson},
        handlers::{list_response, one_or_404},
    },
    auth::AuthenticatedPrincipal,
    db::{to_document, users::USERS},
    models::{Role, UserUpdate},
    state::AppState,
    Error, Result,
};

/// GET /api/users
pub async fn list_users(
    State(state): State<AppState>,
    AuthenticatedPrincipal(principal): AuthenticatedPrincipal,
    params: ListParams,
) -> Result<Response> {
    principal.require_role(&[Role::Admin])?;
    let query = params.apply(state.repos.users.find(), &state.config.api)?;
    list_response(query, &state.db_pool).await
}

/// GET /api/users/:id
pub async fn get_user(
    State(state): State<AppState>,
    AuthenticatedPrincipal(principal): AuthenticatedPrincipal,
    EntityId(id): EntityId,
) -> Result<Json<JsonValue>> {
    if !principal.is_admin() && principal.user_id != id {
        return Err(Error::Forbidden(
            "users may only view their own account".to_string(),
        ));
    }
    one_or_404(state.repos.users.find_by_id(id), &state.db_pool, id).await
}

/// PATCH /api/users/me
pub async fn update_me(
    State(state): State<AppState>,
    AuthenticatedPrincipal(principal): AuthenticatedPrincipal,
    ValidatedJson(patch): ValidatedJson<UserUpdate>,
) -> Result<Json<JsonValue>> {
    let user = state
        .repos
        .users
        .update(principal.user_id, &patch)
        .await?
        .ok_or_else(|| Error::not_found(USERS.name, principal.user_id))?;
    Ok(Json(to_document(&USERS, &user)?))
}

/// DELETE /api/users/:id
pub async fn delete_user(
    State(state): State<AppState>,
    AuthenticatedPrincipal(principal): AuthenticatedPrincipal,
    EntityId(id): EntityId,
) -> Result<StatusCode> {
    principal.require_role(&[Role::Admin])?;
    if !state.repos.users.delete(id).await? {
        return Err(Error::not_found(USERS.name, id));
    }
    tracing::info!(user_id = %id, deleted_by = %principal.user_id, "User deleted");
    Ok(StatusCode::NO_CONTENT)
}
