use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Serialize)]
pub struct Doctor {
    pub id: Uuid,
    pub user_id: Uuid,
    pub specialization: String,
    pub qualification: Option<String>,
    pub experience_years: i32,
    /// Fee in minor currency units.
    pub consultation_fee: i32,
    pub available: bool,
    pub bio: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Profile fields supplied when a doctor registers.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct DoctorProfile {
    #[validate(length(min = 1, max = 120))]
    pub specialization: String,
    pub qualification: Option<String>,
    #[validate(range(min = 0, max = 80))]
    #[serde(default)]
    pub experience_years: i32,
    #[validate(range(min = 0))]
    #[serde(default)]
    pub consultation_fee: i32,
    #[validate(length(max = 4000))]
    pub bio: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct DoctorUpdate {
    #[validate(length(min = 1, max = 120))]
    pub specialization: Option<String>,
    pub qualification: Option<String>,
    #[validate(range(min = 0, max = 80))]
    pub experience_years: Option<i32>,
    #[validate(range(min = 0))]
    pub consultation_fee: Option<i32>,
    pub available: Option<bool>,
    #[validate(length(max = 4000))]
    pub bio: Option<String>,
}
