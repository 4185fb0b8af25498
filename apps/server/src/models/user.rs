use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use uuid::Uuid;
use validator::Validate;

use super::{DoctorProfile, PharmacistProfile, UnknownVariant};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Patient,
    Doctor,
    Pharmacist,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Patient => "patient",
            Role::Doctor => "doctor",
            Role::Pharmacist => "pharmacist",
            Role::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "patient" => Ok(Role::Patient),
            "doctor" => Ok(Role::Doctor),
            "pharmacist" => Ok(Role::Pharmacist),
            "admin" => Ok(Role::Admin),
            other => Err(UnknownVariant {
                kind: "role",
                value: other.to_string(),
            }),
        }
    }
}

/// A stored user. The password hash is never serialized.
#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: Role,
    pub phone: Option<String>,
    pub gender: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub address: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Registration payload.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewUser {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 8, max = 128))]
    pub password: String,
    #[serde(default = "default_role")]
    pub role: Role,
    #[validate(length(max = 40))]
    pub phone: Option<String>,
    pub gender: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub address: Option<String>,
    /// Required when `role` is `doctor`.
    #[validate(nested)]
    pub doctor: Option<DoctorProfile>,
    /// Required when `role` is `pharmacist`.
    #[validate(nested)]
    pub pharmacist: Option<PharmacistProfile>,
}

fn default_role() -> Role {
    Role::Patient
}

impl NewUser {
    /// Trimmed, lower-cased email used for storage and lookup.
    pub fn normalized_email(&self) -> String {
        normalize_email(&self.email)
    }

    /// Cross-field checks that `validator` cannot express.
    pub fn check_role_profile(&self) -> crate::Result<()> {
        match self.role {
            Role::Admin => Err(crate::Error::Forbidden(
                "admin accounts cannot be self-registered".to_string(),
            )),
            Role::Doctor if self.doctor.is_none() => Err(crate::Error::Validation(
                "doctor registration requires a 'doctor' profile".to_string(),
            )),
            Role::Pharmacist if self.pharmacist.is_none() => Err(crate::Error::Validation(
                "pharmacist registration requires a 'pharmacist' profile".to_string(),
            )),
            _ => Ok(()),
        }
    }
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UserUpdate {
    #[validate(length(min = 1, max = 200))]
    pub name: Option<String>,
    #[validate(length(max = 40))]
    pub phone: Option<String>,
    pub gender: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub address: Option<String>,
}
