//! Request payloads shared by the API tests

use chrono::{Duration, Utc};
use serde_json::{json, Value};
use uuid::Uuid;

pub const PASSWORD: &str = "correct-horse-battery";

/// Unique address so tests sharing a database never collide.
pub fn unique_email(prefix: &str) -> String {
    format!("{prefix}.{}@example.org", Uuid::new_v4().simple())
}

pub fn patient_registration(name: &str) -> Value {
    json!({
        "name": name,
        "email": unique_email("patient"),
        "password": PASSWORD,
        "role": "patient",
        "phone": "+15550100"
    })
}

pub fn doctor_registration(name: &str, specialization: &str) -> Value {
    json!({
        "name": name,
        "email": unique_email("doctor"),
        "password": PASSWORD,
        "role": "doctor",
        "phone": "+15550101",
        "doctor": {
            "specialization": specialization,
            "qualification": "MD",
            "experience_years": 12,
            "consultation_fee": 8000
        }
    })
}

pub fn pharmacist_registration(name: &str) -> Value {
    json!({
        "name": name,
        "email": unique_email("pharmacist"),
        "password": PASSWORD,
        "role": "pharmacist",
        "pharmacist": {
            "pharmacy_name": "Corner Pharmacy",
            "license_number": format!("LIC-{}", Uuid::new_v4().simple())
        }
    })
}

pub fn lab_technique(name: &str) -> Value {
    json!({
        "name": name,
        "description": "Fasting sample",
        "price": 2500,
        "duration_minutes": 30
    })
}

/// RFC 3339 timestamp `hours` from now.
pub fn hours_from_now(hours: i64) -> String {
    (Utc::now() + Duration::hours(hours)).to_rfc3339()
}
