//! Registration, login and the current-user endpoint

use axum::{
    extract::State,
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value as JsonValue};
use validator::Validate;

use crate::{
    api::{extractors::ValidatedJson, handlers::created},
    auth::{hash_password, verify_password, AuthError, AuthenticatedPrincipal},
    db::{doctors::DOCTORS, pharmacists::PHARMACISTS, to_document, users::USERS},
    models::{Doctor, NewUser, Pharmacist, Role, User},
    state::AppState,
    Error, Result,
};

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1))]
    pub password: String,
}

/// User document with the role profile embedded when one exists.
pub(crate) fn user_document(
    user: &User,
    doctor: Option<&Doctor>,
    pharmacist: Option<&Pharmacist>,
) -> Result<JsonValue> {
    let mut doc = to_document(&USERS, user)?;
    if let Some(obj) = doc.as_object_mut() {
        if let Some(doctor) = doctor {
            obj.insert("doctor".to_string(), to_document(&DOCTORS, doctor)?);
        }
        if let Some(pharmacist) = pharmacist {
            obj.insert("pharmacist".to_string(), to_document(&PHARMACISTS, pharmacist)?);
        }
    }
    Ok(doc)
}

/// POST /api/auth/register
pub async fn register(
    State(state): State<AppState>,
    ValidatedJson(new): ValidatedJson<NewUser>,
) -> Result<Response> {
    new.check_role_profile()?;

    let password_hash = hash_password(new.password.clone()).await?;
    let registration = state.repos.users.register(&new, &password_hash).await?;
    let token = state.auth.issue_token(&registration.user)?;

    tracing::info!(
        user_id = %registration.user.id,
        role = %registration.user.role,
        "User registered"
    );

    let user = user_document(
        &registration.user,
        registration.doctor.as_ref(),
        registration.pharmacist.as_ref(),
    )?;
    Ok(created(json!({ "token": token, "user": user })))
}

/// POST /api/auth/login
pub async fn login(
    State(state): State<AppState>,
    ValidatedJson(request): ValidatedJson<LoginRequest>,
) -> Result<Response> {
    let Some(user) = state.repos.users.find_by_email(&request.email).await? else {
        return Ok(AuthError::InvalidCredentials.into_response());
    };

    if !verify_password(request.password, user.password_hash.clone()).await? {
        return Ok(AuthError::InvalidCredentials.into_response());
    }

    let token = state.auth.issue_token(&user)?;
    let (doctor, pharmacist) = load_profile(&state, &user).await?;
    let user_doc = user_document(&user, doctor.as_ref(), pharmacist.as_ref())?;

    tracing::debug!(user_id = %user.id, "User logged in");
    Ok(Json(json!({ "token": token, "user": user_doc })).into_response())
}

/// GET /api/auth/me
pub async fn me(
    State(state): State<AppState>,
    AuthenticatedPrincipal(principal): AuthenticatedPrincipal,
) -> Result<Json<JsonValue>> {
    let user = state
        .repos
        .users
        .get(principal.user_id)
        .await?
        .ok_or_else(|| Error::Unauthorized("account no longer exists".to_string()))?;

    let (doctor, pharmacist) = load_profile(&state, &user).await?;
    Ok(Json(user_document(
        &user,
        doctor.as_ref(),
        pharmacist.as_ref(),
    )?))
}

async fn load_profile(
    state: &AppState,
    user: &User,
) -> Result<(Option<Doctor>, Option<Pharmacist>)> {
    match user.role {
        Role::Doctor => Ok((state.repos.doctors.get_by_user(user.id).await?, None)),
        Role::Pharmacist => Ok((None, state.repos.pharmacists.get_by_user(user.id).await?)),
        Role::Patient | Role::Admin => Ok((None, None)),
    }
}
