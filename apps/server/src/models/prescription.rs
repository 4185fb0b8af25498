use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use uuid::Uuid;
use validator::Validate;

use super::UnknownVariant;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrescriptionStatus {
    Active,
    Dispensed,
    Cancelled,
}

impl PrescriptionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PrescriptionStatus::Active => "active",
            PrescriptionStatus::Dispensed => "dispensed",
            PrescriptionStatus::Cancelled => "cancelled",
        }
    }

    pub fn transition(&self, next: PrescriptionStatus) -> crate::Result<PrescriptionStatus> {
        match (self, next) {
            (PrescriptionStatus::Active, PrescriptionStatus::Dispensed)
            | (PrescriptionStatus::Active, PrescriptionStatus::Cancelled) => Ok(next),
            _ => Err(crate::Error::InvalidTransition {
                from: self.to_string(),
                to: next.to_string(),
            }),
        }
    }
}

impl fmt::Display for PrescriptionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PrescriptionStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(PrescriptionStatus::Active),
            "dispensed" => Ok(PrescriptionStatus::Dispensed),
            "cancelled" => Ok(PrescriptionStatus::Cancelled),
            other => Err(UnknownVariant {
                kind: "prescription status",
                value: other.to_string(),
            }),
        }
    }
}

/// One line of a prescription, stored inside a JSONB array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct Medication {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[validate(length(min = 1, max = 100))]
    pub dosage: String,
    #[validate(length(min = 1, max = 100))]
    pub frequency: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Prescription {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub appointment_id: Option<Uuid>,
    pub medications: Vec<Medication>,
    pub instructions: Option<String>,
    pub status: PrescriptionStatus,
    pub pharmacist_id: Option<Uuid>,
    pub dispensed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewPrescription {
    pub patient_id: Uuid,
    pub appointment_id: Option<Uuid>,
    #[validate(length(min = 1, max = 50), nested)]
    pub medications: Vec<Medication>,
    #[validate(length(max = 4000))]
    pub instructions: Option<String>,
}
