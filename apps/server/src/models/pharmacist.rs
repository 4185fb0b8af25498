use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Serialize)]
pub struct Pharmacist {
    pub id: Uuid,
    pub user_id: Uuid,
    pub pharmacy_name: String,
    pub license_number: String,
    pub address: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct PharmacistProfile {
    #[validate(length(min = 1, max = 200))]
    pub pharmacy_name: String,
    #[validate(length(min = 1, max = 64))]
    pub license_number: String,
    pub address: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct PharmacistUpdate {
    #[validate(length(min = 1, max = 200))]
    pub pharmacy_name: Option<String>,
    pub address: Option<String>,
}
