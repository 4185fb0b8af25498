use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::BookingStatus;

#[derive(Debug, Clone, Serialize)]
pub struct LabTechnique {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    /// Price in minor currency units.
    pub price: i32,
    pub duration_minutes: i32,
    pub available: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewLabTechnique {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[validate(length(max = 4000))]
    pub description: Option<String>,
    #[validate(range(min = 0))]
    pub price: i32,
    #[validate(range(min = 1, max = 1440))]
    pub duration_minutes: i32,
    #[serde(default = "default_available")]
    pub available: bool,
}

fn default_available() -> bool {
    true
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct LabTechniqueUpdate {
    #[validate(length(min = 1, max = 200))]
    pub name: Option<String>,
    #[validate(length(max = 4000))]
    pub description: Option<String>,
    #[validate(range(min = 0))]
    pub price: Option<i32>,
    #[validate(range(min = 1, max = 1440))]
    pub duration_minutes: Option<i32>,
    pub available: Option<bool>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LabBooking {
    pub id: Uuid,
    pub user_id: Uuid,
    pub lab_technique_id: Uuid,
    pub scheduled_at: DateTime<Utc>,
    pub status: BookingStatus,
    pub result_notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewLabBooking {
    pub lab_technique_id: Uuid,
    pub scheduled_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct LabBookingStatusUpdate {
    pub status: BookingStatus,
    #[validate(length(max = 8000))]
    pub result_notes: Option<String>,
}
