//! Lab bookings made by patients against the technique catalogue

use axum::{extract::State, http::StatusCode, response::Response, Json};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::{
    api::{
        extractors::{EntityId, ListParams, ValidatedJson},
        handlers::{created, ensure_future, list_response, one_or_404},
    },
    auth::{AuthenticatedPrincipal, Principal},
    db::{lab_bookings::LAB_BOOKINGS, to_document, FilterValue},
    metrics::BOOKINGS_CREATED_TOTAL,
    models::{BookingStatus, LabBooking, LabBookingStatusUpdate, NewLabBooking, Role},
    state::AppState,
    Error, Result,
};

async fn load_visible(state: &AppState, principal: &Principal, id: Uuid) -> Result<LabBooking> {
    let booking = state
        .repos
        .lab_bookings
        .get(id)
        .await?
        .ok_or_else(|| Error::not_found(LAB_BOOKINGS.name, id))?;
    if !principal.is_admin() && booking.user_id != principal.user_id {
        return Err(Error::Forbidden(
            "lab booking belongs to another user".to_string(),
        ));
    }
    Ok(booking)
}

/// POST /api/lab-bookings
pub async fn create_lab_booking(
    State(state): State<AppState>,
    AuthenticatedPrincipal(principal): AuthenticatedPrincipal,
    ValidatedJson(new): ValidatedJson<NewLabBooking>,
) -> Result<Response> {
    principal.require_role(&[Role::Patient])?;
    ensure_future(new.scheduled_at)?;

    let technique = state
        .repos
        .lab_techniques
        .get(new.lab_technique_id)
        .await?
        .ok_or_else(|| Error::not_found("LabTechnique", new.lab_technique_id))?;
    if !technique.available {
        return Err(Error::Conflict(format!(
            "lab technique '{}' is not available",
            technique.name
        )));
    }

    let booking = state
        .repos
        .lab_bookings
        .create(principal.user_id, &new)
        .await?;
    BOOKINGS_CREATED_TOTAL
        .with_label_values(&["lab_booking"])
        .inc();
    tracing::info!(booking_id = %booking.id, technique = %technique.name, "Lab booking created");

    Ok(created(to_document(&LAB_BOOKINGS, &booking)?))
}

/// GET /api/lab-bookings
pub async fn list_lab_bookings(
    State(state): State<AppState>,
    AuthenticatedPrincipal(principal): AuthenticatedPrincipal,
    params: ListParams,
) -> Result<Response> {
    principal.require_role(&[Role::Patient, Role::Admin])?;

    let mut query = state.repos.lab_bookings.find().populate("labTechnique");
    if !principal.is_admin() {
        query = query.where_eq("user_id", FilterValue::Uuid(principal.user_id));
    }
    let query = params.apply(query, &state.config.api)?;
    list_response(query, &state.db_pool).await
}

/// GET /api/lab-bookings/:id
pub async fn get_lab_booking(
    State(state): State<AppState>,
    AuthenticatedPrincipal(principal): AuthenticatedPrincipal,
    EntityId(id): EntityId,
) -> Result<Json<JsonValue>> {
    load_visible(&state, &principal, id).await?;
    let query = state
        .repos
        .lab_bookings
        .find_by_id(id)
        .populate("labTechnique");
    one_or_404(query, &state.db_pool, id).await
}

/// PATCH /api/lab-bookings/:id/status
pub async fn update_status(
    State(state): State<AppState>,
    AuthenticatedPrincipal(principal): AuthenticatedPrincipal,
    EntityId(id): EntityId,
    ValidatedJson(update): ValidatedJson<LabBookingStatusUpdate>,
) -> Result<Json<JsonValue>> {
    let booking = load_visible(&state, &principal, id).await?;
    if !principal.is_admin() && update.status != BookingStatus::Cancelled {
        return Err(Error::Forbidden(
            "only an administrator can progress a lab booking".to_string(),
        ));
    }

    let next = booking.status.transition(update.status)?;
    let updated = state
        .repos
        .lab_bookings
        .set_status(id, booking.status, next, update.result_notes.as_deref())
        .await?
        // Another request moved it first.
        .ok_or_else(|| Error::InvalidTransition {
            from: booking.status.to_string(),
            to: next.to_string(),
        })?;

    tracing::info!(booking_id = %id, from = %booking.status, to = %next, "Lab booking status changed");
    Ok(Json(to_document(&LAB_BOOKINGS, &updated)?))
}

/// DELETE /api/lab-bookings/:id
pub async fn delete_lab_booking(
    State(state): State<AppState>,
    AuthenticatedPrincipal(principal): AuthenticatedPrincipal,
    EntityId(id): EntityId,
) -> Result<StatusCode> {
    load_visible(&state, &principal, id).await?;
    if !state.repos.lab_bookings.delete(id).await? {
        return Err(Error::not_found(LAB_BOOKINGS.name, id));
    }
    Ok(StatusCode::NO_CONTENT)
}
