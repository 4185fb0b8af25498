//! Prescription repository
//!
//! Medications live in a JSONB array column; they are returned whole and
//! cannot be filtered or sorted on.

use chrono::Utc;
use sqlx::{postgres::PgRow, types::Json, PgPool, Row};
use std::time::Instant;
use uuid::Uuid;

use super::appointments::appointments;
use super::doctors::doctors;
use super::document::{Column, ColumnType, EntityDef, Relation};
use super::observe;
use super::pharmacists::pharmacists;
use super::query::FindQuery;
use super::users::users;
use crate::{
    models::{Medication, NewPrescription, Prescription, PrescriptionStatus},
    Error, Result,
};

pub static PRESCRIPTIONS: EntityDef = EntityDef {
    name: "Prescription",
    table: "prescriptions",
    columns: &[
        Column::new("id", ColumnType::Uuid),
        Column::new("patient_id", ColumnType::Uuid).alias("patient"),
        Column::new("doctor_id", ColumnType::Uuid).alias("doctor"),
        Column::new("appointment_id", ColumnType::Uuid).alias("appointment"),
        Column::new("medications", ColumnType::Json),
        Column::new("instructions", ColumnType::Text),
        Column::new("status", ColumnType::Text),
        Column::new("pharmacist_id", ColumnType::Uuid).alias("pharmacist"),
        Column::new("dispensed_at", ColumnType::Timestamp).alias("dispensedAt"),
        Column::new("created_at", ColumnType::Timestamp).alias("createdAt"),
        Column::new("updated_at", ColumnType::Timestamp).alias("updatedAt"),
    ],
    relations: &[
        Relation {
            path: "patient",
            local_key: "patient_id",
            target: users,
        },
        Relation {
            path: "doctor",
            local_key: "doctor_id",
            target: doctors,
        },
        Relation {
            path: "appointment",
            local_key: "appointment_id",
            target: appointments,
        },
        Relation {
            path: "pharmacist",
            local_key: "pharmacist_id",
            target: pharmacists,
        },
    ],
    default_sort: "-created_at",
};

const PRESCRIPTION_COLUMNS: &str = "id, patient_id, doctor_id, appointment_id, medications, \
                                    instructions, status, pharmacist_id, dispensed_at, \
                                    created_at, updated_at";

#[derive(Clone)]
pub struct PrescriptionRepository {
    pool: PgPool,
}

impl PrescriptionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn find(&self) -> FindQuery {
        FindQuery::new(&PRESCRIPTIONS)
    }

    pub fn find_by_id(&self, id: Uuid) -> FindQuery {
        self.find().by_id(id)
    }

    pub async fn get(&self, id: Uuid) -> Result<Option<Prescription>> {
        let row = sqlx::query(&format!(
            "SELECT {PRESCRIPTION_COLUMNS} FROM prescriptions WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(prescription_from_row).transpose()
    }

    pub async fn create(&self, doctor_id: Uuid, new: &NewPrescription) -> Result<Prescription> {
        let start = Instant::now();
        let now = Utc::now();
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO prescriptions (id, patient_id, doctor_id, appointment_id, medications,
                                       instructions, status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $8)
            RETURNING {PRESCRIPTION_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(new.patient_id)
        .bind(doctor_id)
        .bind(new.appointment_id)
        .bind(Json(&new.medications))
        .bind(&new.instructions)
        .bind(PrescriptionStatus::Active.as_str())
        .bind(now)
        .fetch_one(&self.pool)
        .await?;
        observe(PRESCRIPTIONS.name, "create", start);
        prescription_from_row(&row)
    }

    /// Mark an active prescription dispensed by `pharmacist_id`.
    ///
    /// Returns `None` when the prescription is missing or no longer active.
    pub async fn dispense(&self, id: Uuid, pharmacist_id: Uuid) -> Result<Option<Prescription>> {
        let row = sqlx::query(&format!(
            r#"
            UPDATE prescriptions SET
                status = $2,
                pharmacist_id = $3,
                dispensed_at = now(),
                updated_at = now()
            WHERE id = $1 AND status = $4
            RETURNING {PRESCRIPTION_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(PrescriptionStatus::Dispensed.as_str())
        .bind(pharmacist_id)
        .bind(PrescriptionStatus::Active.as_str())
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(prescription_from_row).transpose()
    }

    /// Cancel an active prescription. `None` when missing or not active.
    pub async fn cancel(&self, id: Uuid) -> Result<Option<Prescription>> {
        let row = sqlx::query(&format!(
            r#"
            UPDATE prescriptions SET status = $2, updated_at = now()
            WHERE id = $1 AND status = $3
            RETURNING {PRESCRIPTION_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(PrescriptionStatus::Cancelled.as_str())
        .bind(PrescriptionStatus::Active.as_str())
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(prescription_from_row).transpose()
    }
}

fn prescription_from_row(row: &PgRow) -> Result<Prescription> {
    let status: String = row.try_get("status")?;
    let medications: Json<Vec<Medication>> = row.try_get("medications")?;
    Ok(Prescription {
        id: row.try_get("id")?,
        patient_id: row.try_get("patient_id")?,
        doctor_id: row.try_get("doctor_id")?,
        appointment_id: row.try_get("appointment_id")?,
        medications: medications.0,
        instructions: row.try_get("instructions")?,
        status: status
            .parse()
            .map_err(|e| Error::Internal(format!("stored prescription has {e}")))?,
        pharmacist_id: row.try_get("pharmacist_id")?,
        dispensed_at: row.try_get("dispensed_at")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}
