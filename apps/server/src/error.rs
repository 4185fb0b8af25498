//! Error types for the CareBook API

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("{entity} not found: {id}")]
    RecordNotFound { entity: &'static str, id: String },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Authentication required: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Invalid status transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },

    #[error("Internal server error: {0}")]
    Internal(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Error::RecordNotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// HTTP status and machine-readable code for this error.
    pub fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            Error::RecordNotFound { .. } | Error::NotFound(_) => {
                (StatusCode::NOT_FOUND, "not_found")
            }
            Error::Validation(_) | Error::InvalidQuery(_) => {
                (StatusCode::BAD_REQUEST, "validation_error")
            }
            Error::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "unauthorized"),
            Error::Forbidden(_) => (StatusCode::FORBIDDEN, "forbidden"),
            Error::Conflict(_) => (StatusCode::CONFLICT, "conflict"),
            Error::InvalidTransition { .. } => (StatusCode::CONFLICT, "invalid_transition"),
            Error::Database(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                (StatusCode::CONFLICT, "conflict")
            }
            Error::Database(sqlx::Error::Database(db)) if db.is_foreign_key_violation() => {
                (StatusCode::BAD_REQUEST, "validation_error")
            }
            Error::Database(_) | Error::Internal(_) | Error::Other(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error")
            }
        }
    }

    fn public_message(&self) -> String {
        match self {
            Error::Database(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                "A record with the same unique value already exists".to_string()
            }
            Error::Database(sqlx::Error::Database(db)) if db.is_foreign_key_violation() => {
                "Referenced record does not exist".to_string()
            }
            Error::Database(_) | Error::Internal(_) | Error::Other(_) => {
                "Internal server error".to_string()
            }
            _ => self.to_string(),
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self, "Internal error");
        } else {
            tracing::debug!(error = %self, status = status.as_u16(), "Request failed");
        }

        let body = Json(json!({
            "error": code,
            "message": self.public_message(),
        }));

        (status, body).into_response()
    }
}

impl From<validator::ValidationErrors> for Error {
    fn from(errors: validator::ValidationErrors) -> Self {
        Error::Validation(errors.to_string())
    }
}
