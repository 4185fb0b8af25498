//! Prescriptions: issued by doctors, dispensed by pharmacists

use axum::{extract::State, response::Response, Json};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::{
    api::{
        extractors::{EntityId, ListParams, ValidatedJson},
        handlers::{created, doctors::PUBLIC_USER_FIELDS, list_response, one_or_404},
    },
    auth::{AuthenticatedPrincipal, Principal},
    db::{prescriptions::PRESCRIPTIONS, to_document, FilterValue, FindQuery},
    models::{NewPrescription, Prescription, PrescriptionStatus, Role},
    state::AppState,
    Error, Result,
};

fn populated(query: FindQuery) -> FindQuery {
    query
        .populate_select("patient", PUBLIC_USER_FIELDS)
        .populate("doctor")
        .populate_select("doctor.user", PUBLIC_USER_FIELDS)
        .populate("pharmacist")
}

/// Profile id of the calling doctor, or 404 when the profile is gone.
async fn own_doctor_id(state: &AppState, principal: &Principal) -> Result<Uuid> {
    state
        .repos
        .doctors
        .get_by_user(principal.user_id)
        .await?
        .map(|doctor| doctor.id)
        .ok_or_else(|| Error::NotFound("doctor profile".to_string()))
}

async fn load(state: &AppState, id: Uuid) -> Result<Prescription> {
    state
        .repos
        .prescriptions
        .get(id)
        .await?
        .ok_or_else(|| Error::not_found(PRESCRIPTIONS.name, id))
}

async fn can_view(state: &AppState, principal: &Principal, prescription: &Prescription) -> Result<bool> {
    Ok(match principal.role {
        Role::Admin | Role::Pharmacist => true,
        Role::Patient => prescription.patient_id == principal.user_id,
        Role::Doctor => own_doctor_id(state, principal).await? == prescription.doctor_id,
    })
}

/// POST /api/prescriptions
pub async fn create_prescription(
    State(state): State<AppState>,
    AuthenticatedPrincipal(principal): AuthenticatedPrincipal,
    ValidatedJson(new): ValidatedJson<NewPrescription>,
) -> Result<Response> {
    principal.require_role(&[Role::Doctor])?;
    let doctor_id = own_doctor_id(&state, &principal).await?;

    let patient = state
        .repos
        .users
        .get(new.patient_id)
        .await?
        .ok_or_else(|| Error::not_found("User", new.patient_id))?;
    if patient.role != Role::Patient {
        return Err(Error::Validation(
            "prescriptions can only be issued to patients".to_string(),
        ));
    }

    if let Some(appointment_id) = new.appointment_id {
        let appointment = state
            .repos
            .appointments
            .get(appointment_id)
            .await?
            .ok_or_else(|| Error::not_found("Appointment", appointment_id))?;
        if appointment.doctor_id != doctor_id || appointment.patient_id != new.patient_id {
            return Err(Error::Validation(
                "appointment does not belong to this doctor and patient".to_string(),
            ));
        }
    }

    let prescription = state.repos.prescriptions.create(doctor_id, &new).await?;
    tracing::info!(
        prescription_id = %prescription.id,
        medications = prescription.medications.len(),
        "Prescription issued"
    );
    Ok(created(to_document(&PRESCRIPTIONS, &prescription)?))
}

/// GET /api/prescriptions
pub async fn list_prescriptions(
    State(state): State<AppState>,
    AuthenticatedPrincipal(principal): AuthenticatedPrincipal,
    params: ListParams,
) -> Result<Response> {
    let mut query = populated(state.repos.prescriptions.find());
    match principal.role {
        Role::Admin | Role::Pharmacist => {}
        Role::Patient => {
            query = query.where_eq("patient_id", FilterValue::Uuid(principal.user_id));
        }
        Role::Doctor => {
            let doctor_id = own_doctor_id(&state, &principal).await?;
            query = query.where_eq("doctor_id", FilterValue::Uuid(doctor_id));
        }
    }
    let query = params.apply(query, &state.config.api)?;
    list_response(query, &state.db_pool).await
}

/// GET /api/prescriptions/:id
pub async fn get_prescription(
    State(state): State<AppState>,
    AuthenticatedPrincipal(principal): AuthenticatedPrincipal,
    EntityId(id): EntityId,
) -> Result<Json<JsonValue>> {
    let prescription = load(&state, id).await?;
    if !can_view(&state, &principal, &prescription).await? {
        return Err(Error::Forbidden(
            "not allowed to view this prescription".to_string(),
        ));
    }
    one_or_404(
        populated(state.repos.prescriptions.find_by_id(id)),
        &state.db_pool,
        id,
    )
    .await
}

/// PATCH /api/prescriptions/:id/dispense
pub async fn dispense_prescription(
    State(state): State<AppState>,
    AuthenticatedPrincipal(principal): AuthenticatedPrincipal,
    EntityId(id): EntityId,
) -> Result<Json<JsonValue>> {
    principal.require_role(&[Role::Pharmacist])?;
    let pharmacist = state
        .repos
        .pharmacists
        .get_by_user(principal.user_id)
        .await?
        .ok_or_else(|| Error::NotFound("pharmacist profile".to_string()))?;

    let current = load(&state, id).await?;
    current.status.transition(PrescriptionStatus::Dispensed)?;

    // A concurrent dispense or cancel can win between the read and the update.
    let dispensed = state
        .repos
        .prescriptions
        .dispense(id, pharmacist.id)
        .await?
        .ok_or_else(|| Error::InvalidTransition {
            from: "non-active".to_string(),
            to: PrescriptionStatus::Dispensed.to_string(),
        })?;

    tracing::info!(prescription_id = %id, pharmacist_id = %pharmacist.id, "Prescription dispensed");
    Ok(Json(to_document(&PRESCRIPTIONS, &dispensed)?))
}

/// PATCH /api/prescriptions/:id/cancel
pub async fn cancel_prescription(
    State(state): State<AppState>,
    AuthenticatedPrincipal(principal): AuthenticatedPrincipal,
    EntityId(id): EntityId,
) -> Result<Json<JsonValue>> {
    principal.require_role(&[Role::Doctor, Role::Admin])?;
    let current = load(&state, id).await?;
    if principal.role == Role::Doctor && own_doctor_id(&state, &principal).await? != current.doctor_id {
        return Err(Error::Forbidden(
            "only the issuing doctor may cancel a prescription".to_string(),
        ));
    }
    current.status.transition(PrescriptionStatus::Cancelled)?;

    let cancelled = state
        .repos
        .prescriptions
        .cancel(id)
        .await?
        .ok_or_else(|| Error::InvalidTransition {
            from: "non-active".to_string(),
            to: PrescriptionStatus::Cancelled.to_string(),
        })?;
    Ok(Json(to_document(&PRESCRIPTIONS, &cancelled)?))
}
