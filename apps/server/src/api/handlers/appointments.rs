//! Appointment booking and lifecycle

use axum::{extract::State, http::StatusCode, response::Response, Json};
use serde_json::Value as JsonValue;

use crate::{
    api::{
        extractors::{EntityId, ListParams, ValidatedJson},
        handlers::{created, doctors::PUBLIC_USER_FIELDS, ensure_future, list_response, one_or_404},
    },
    auth::{AuthenticatedPrincipal, Principal},
    db::{appointments::APPOINTMENTS, to_document, FilterValue, FindQuery},
    metrics::BOOKINGS_CREATED_TOTAL,
    models::{Appointment, AppointmentStatusUpdate, BookingStatus, NewAppointment, Role},
    state::AppState,
    Error, Result,
};

/// Appointment query with the doctor (and the doctor's user) and the
/// patient embedded.
fn populated(query: FindQuery) -> FindQuery {
    query
        .populate("doctor")
        .populate_select("doctor.user", PUBLIC_USER_FIELDS)
        .populate_select("patient", PUBLIC_USER_FIELDS)
}

/// How the caller relates to one appointment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Participation {
    Admin,
    Doctor,
    Patient,
    None,
}

async fn participation(
    state: &AppState,
    principal: &Principal,
    appointment: &Appointment,
) -> Result<Participation> {
    Ok(match principal.role {
        Role::Admin => Participation::Admin,
        Role::Patient if appointment.patient_id == principal.user_id => Participation::Patient,
        Role::Doctor => {
            let own = state
                .repos
                .doctors
                .get_by_user(principal.user_id)
                .await?
                .is_some_and(|doctor| doctor.id == appointment.doctor_id);
            if own {
                Participation::Doctor
            } else {
                Participation::None
            }
        }
        _ => Participation::None,
    })
}

/// Which status changes each participant may request.
fn may_request(participation: Participation, next: BookingStatus) -> bool {
    match participation {
        Participation::Admin => true,
        Participation::Doctor => matches!(
            next,
            BookingStatus::Confirmed | BookingStatus::Completed | BookingStatus::Cancelled
        ),
        Participation::Patient => next == BookingStatus::Cancelled,
        Participation::None => false,
    }
}

async fn load(state: &AppState, id: uuid::Uuid) -> Result<Appointment> {
    state
        .repos
        .appointments
        .get(id)
        .await?
        .ok_or_else(|| Error::not_found(APPOINTMENTS.name, id))
}

/// POST /api/appointments
pub async fn create_appointment(
    State(state): State<AppState>,
    AuthenticatedPrincipal(principal): AuthenticatedPrincipal,
    ValidatedJson(new): ValidatedJson<NewAppointment>,
) -> Result<Response> {
    principal.require_role(&[Role::Patient])?;
    ensure_future(new.scheduled_at)?;

    let doctor = state
        .repos
        .doctors
        .get(new.doctor_id)
        .await?
        .ok_or_else(|| Error::not_found("Doctor", new.doctor_id))?;
    if !doctor.available {
        return Err(Error::Conflict(
            "doctor is not accepting appointments".to_string(),
        ));
    }

    let appointment = state
        .repos
        .appointments
        .create(principal.user_id, &new)
        .await?;
    BOOKINGS_CREATED_TOTAL
        .with_label_values(&["appointment"])
        .inc();
    tracing::info!(
        appointment_id = %appointment.id,
        doctor_id = %appointment.doctor_id,
        "Appointment booked"
    );

    Ok(created(to_document(&APPOINTMENTS, &appointment)?))
}

/// GET /api/appointments
pub async fn list_appointments(
    State(state): State<AppState>,
    AuthenticatedPrincipal(principal): AuthenticatedPrincipal,
    params: ListParams,
) -> Result<Response> {
    let mut query = populated(state.repos.appointments.find());
    match principal.role {
        Role::Admin => {}
        Role::Patient => {
            query = query.where_eq("patient_id", FilterValue::Uuid(principal.user_id));
        }
        Role::Doctor => {
            let doctor = state
                .repos
                .doctors
                .get_by_user(principal.user_id)
                .await?
                .ok_or_else(|| Error::NotFound("doctor profile".to_string()))?;
            query = query.where_eq("doctor_id", FilterValue::Uuid(doctor.id));
        }
        Role::Pharmacist => {
            return Err(Error::Forbidden(
                "pharmacists cannot list appointments".to_string(),
            ))
        }
    }

    let query = params.apply(query, &state.config.api)?;
    list_response(query, &state.db_pool).await
}

/// GET /api/appointments/:id
pub async fn get_appointment(
    State(state): State<AppState>,
    AuthenticatedPrincipal(principal): AuthenticatedPrincipal,
    EntityId(id): EntityId,
) -> Result<Json<JsonValue>> {
    let appointment = load(&state, id).await?;
    if participation(&state, &principal, &appointment).await? == Participation::None {
        return Err(Error::Forbidden(
            "not a participant of this appointment".to_string(),
        ));
    }
    one_or_404(
        populated(state.repos.appointments.find_by_id(id)),
        &state.db_pool,
        id,
    )
    .await
}

/// PATCH /api/appointments/:id/status
pub async fn update_status(
    State(state): State<AppState>,
    AuthenticatedPrincipal(principal): AuthenticatedPrincipal,
    EntityId(id): EntityId,
    ValidatedJson(update): ValidatedJson<AppointmentStatusUpdate>,
) -> Result<Json<JsonValue>> {
    let appointment = load(&state, id).await?;
    let role = participation(&state, &principal, &appointment).await?;
    if !may_request(role, update.status) {
        return Err(Error::Forbidden(format!(
            "not allowed to mark this appointment {}",
            update.status
        )));
    }

    let next = appointment.status.transition(update.status)?;
    let updated = state
        .repos
        .appointments
        .set_status(id, appointment.status, next, update.notes.as_deref())
        .await?
        // Another request moved it first.
        .ok_or_else(|| Error::InvalidTransition {
            from: appointment.status.to_string(),
            to: next.to_string(),
        })?;

    tracing::info!(
        appointment_id = %id,
        from = %appointment.status,
        to = %next,
        "Appointment status changed"
    );
    Ok(Json(to_document(&APPOINTMENTS, &updated)?))
}

/// DELETE /api/appointments/:id
pub async fn delete_appointment(
    State(state): State<AppState>,
    AuthenticatedPrincipal(principal): AuthenticatedPrincipal,
    EntityId(id): EntityId,
) -> Result<StatusCode> {
    principal.require_role(&[Role::Admin])?;
    if !state.repos.appointments.delete(id).await? {
        return Err(Error::not_found(APPOINTMENTS.name, id));
    }
    Ok(StatusCode::NO_CONTENT)
}
