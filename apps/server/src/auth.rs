//! Authentication / Authorization primitives.
//!
//! Users log in with email and password and receive an HS256 bearer token.
//! [`auth_middleware`] verifies the token on every `/api` request and
//! attaches the [`Principal`]; handlers gate on roles with
//! [`Principal::require_role`].

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::{
    api::middleware::RequestId,
    config::{AuthConfig, MAX_TOKEN_TTL_HOURS},
    metrics::AUTH_FAILURES_TOTAL,
    models::{Role, User},
    state::AppState,
    Error, Result,
};

/// The caller behind a verified bearer token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub user_id: Uuid,
    pub email: String,
    pub role: Role,
}

impl Principal {
    pub fn has_role(&self, role: Role) -> bool {
        self.role == role
    }

    pub fn is_admin(&self) -> bool {
        self.has_role(Role::Admin)
    }

    /// Fails with 403 unless the principal holds one of `allowed`.
    pub fn require_role(&self, allowed: &[Role]) -> Result<()> {
        if allowed.contains(&self.role) {
            Ok(())
        } else {
            Err(Error::Forbidden(format!(
                "role '{}' may not perform this action",
                self.role
            )))
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Claims {
    sub: Uuid,
    email: String,
    role: Role,
    iat: i64,
    exp: i64,
    iss: String,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("Missing bearer token")]
    MissingToken,
    #[error("Invalid bearer token: {0}")]
    InvalidToken(String),
    #[error("Bearer token has expired")]
    ExpiredToken,
    #[error("Invalid email or password")]
    InvalidCredentials,
}

impl AuthError {
    fn reason(&self) -> &'static str {
        match self {
            Self::MissingToken => "missing_token",
            Self::InvalidToken(_) => "invalid_token",
            Self::ExpiredToken => "expired_token",
            Self::InvalidCredentials => "invalid_credentials",
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        AUTH_FAILURES_TOTAL
            .with_label_values(&[self.reason()])
            .inc();
        tracing::debug!(reason = self.reason(), "Authentication failed");

        let body = Json(json!({
            "error": "unauthorized",
            "message": self.to_string(),
        }));
        let mut response = (StatusCode::UNAUTHORIZED, body).into_response();
        response
            .headers_mut()
            .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        response
    }
}

impl From<AuthError> for Error {
    fn from(err: AuthError) -> Self {
        Error::Unauthorized(err.to_string())
    }
}

/// Issues and verifies HS256 bearer tokens.
#[derive(Clone)]
pub struct AuthManager {
    encoding: EncodingKey,
    decoding: DecodingKey,
    issuer: String,
    token_ttl: chrono::Duration,
}

impl AuthManager {
    pub fn new(config: &AuthConfig) -> Self {
        let secret = config.jwt_secret.as_bytes();
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            issuer: config.issuer.clone(),
            // Clamped for configs that skipped validation.
            token_ttl: chrono::Duration::hours(
                config.token_ttl_hours.min(MAX_TOKEN_TTL_HOURS) as i64,
            ),
        }
    }

    pub fn issue_token(&self, user: &User) -> Result<String> {
        let now = Utc::now();
        let claims = Claims {
            sub: user.id,
            email: user.email.clone(),
            role: user.role,
            iat: now.timestamp(),
            exp: (now + self.token_ttl).timestamp(),
            iss: self.issuer.clone(),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| Error::Internal(format!("failed to sign token: {e}")))
    }

    pub fn verify_token(&self, token: &str) -> std::result::Result<Principal, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[self.issuer.as_str()]);
        validation.set_required_spec_claims(&["exp", "iss", "sub"]);
        validation.leeway = 30;

        let data = decode::<Claims>(token, &self.decoding, &validation).map_err(|e| {
            match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::ExpiredToken,
                _ => AuthError::InvalidToken(e.to_string()),
            }
        })?;

        Ok(Principal {
            user_id: data.claims.sub,
            email: data.claims.email,
            role: data.claims.role,
        })
    }

    /// `Ok(None)` when no Authorization header is present.
    pub fn authenticate_headers(
        &self,
        headers: &HeaderMap,
    ) -> std::result::Result<Option<Principal>, AuthError> {
        let Some(value) = headers.get(header::AUTHORIZATION) else {
            return Ok(None);
        };
        let value = value.to_str().map_err(|_| {
            AuthError::InvalidToken("Authorization header is not valid UTF-8".to_string())
        })?;
        let token = bearer_token(value).ok_or_else(|| {
            AuthError::InvalidToken("Authorization header must be 'Bearer <token>'".to_string())
        })?;
        self.verify_token(token).map(Some)
    }
}

fn bearer_token(value: &str) -> Option<&str> {
    let (scheme, token) = value.trim().split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

pub async fn hash_password(password: String) -> Result<String> {
    tokio::task::spawn_blocking(move || -> Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| Error::Internal(format!("password hashing failed: {e}")))
    })
    .await
    .map_err(|e| Error::Internal(format!("password hashing task failed: {e}")))?
}

/// `Ok(false)` on a wrong password; errors only for unreadable hashes.
pub async fn verify_password(password: String, password_hash: String) -> Result<bool> {
    tokio::task::spawn_blocking(move || -> Result<bool> {
        let parsed = PasswordHash::new(&password_hash)
            .map_err(|e| Error::Internal(format!("stored password hash is invalid: {e}")))?;
        Ok(Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok())
    })
    .await
    .map_err(|e| Error::Internal(format!("password verification task failed: {e}")))?
}

/// Extractor for the principal attached by [`auth_middleware`].
///
/// Use `Option<AuthenticatedPrincipal>` in handlers that also serve
/// anonymous callers.
#[derive(Debug, Clone)]
pub struct AuthenticatedPrincipal(pub Principal);

#[async_trait::async_trait]
impl<S> FromRequestParts<S> for AuthenticatedPrincipal
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> std::result::Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Principal>()
            .cloned()
            .map(AuthenticatedPrincipal)
            .ok_or_else(|| AuthError::MissingToken.into_response())
    }
}

/// Attach the caller's `Principal` when a bearer token is presented.
///
/// Requests without a token pass through anonymously; a token that fails
/// verification is rejected here with 401.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Response {
    if req.method() == axum::http::Method::OPTIONS {
        return next.run(req).await;
    }

    match state.auth.authenticate_headers(req.headers()) {
        Ok(Some(principal)) => {
            tracing::Span::current()
                .record("user_id", tracing::field::display(principal.user_id));
            req.extensions_mut().insert(principal);
            next.run(req).await
        }
        Ok(None) => next.run(req).await,
        Err(err) => {
            let request_id = req
                .extensions()
                .get::<RequestId>()
                .map(RequestId::as_str)
                .unwrap_or("-");
            tracing::debug!(request_id, path = %req.uri().path(), error = %err, "Bearer token rejected");
            err.into_response()
        }
    }
}
