//! Appointment repository

use chrono::Utc;
use sqlx::{postgres::PgRow, PgPool, Row};
use std::time::Instant;
use uuid::Uuid;

use super::doctors::doctors;
use super::document::{Column, ColumnType, EntityDef, Relation};
use super::query::FindQuery;
use super::users::users;
use super::observe;
use crate::{
    models::{Appointment, BookingStatus, NewAppointment},
    Error, Result,
};

pub static APPOINTMENTS: EntityDef = EntityDef {
    name: "Appointment",
    table: "appointments",
    columns: &[
        Column::new("id", ColumnType::Uuid),
        Column::new("patient_id", ColumnType::Uuid).alias("patient"),
        Column::new("doctor_id", ColumnType::Uuid).alias("doctor"),
        Column::new("scheduled_at", ColumnType::Timestamp).alias("date"),
        Column::new("reason", ColumnType::Text),
        Column::new("status", ColumnType::Text),
        Column::new("notes", ColumnType::Text),
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
    ],
    default_sort: "scheduled_at",
};

pub(crate) fn appointments() -> &'static EntityDef {
    &APPOINTMENTS
}

const APPOINTMENT_COLUMNS: &str = "id, patient_id, doctor_id, scheduled_at, reason, status, \
                                   notes, created_at, updated_at";

#[derive(Clone)]
pub struct AppointmentRepository {
    pool: PgPool,
}

impl AppointmentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn find(&self) -> FindQuery {
        FindQuery::new(&APPOINTMENTS)
    }

    pub fn find_by_id(&self, id: Uuid) -> FindQuery {
        self.find().by_id(id)
    }

    pub async fn get(&self, id: Uuid) -> Result<Option<Appointment>> {
        let row = sqlx::query(&format!(
            "SELECT {APPOINTMENT_COLUMNS} FROM appointments WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(appointment_from_row).transpose()
    }

    /// Book a pending appointment for `patient_id`.
    pub async fn create(&self, patient_id: Uuid, new: &NewAppointment) -> Result<Appointment> {
        let start = Instant::now();
        let now = Utc::now();
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO appointments (id, patient_id, doctor_id, scheduled_at, reason, status,
                                      created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $7)
            RETURNING {APPOINTMENT_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(patient_id)
        .bind(new.doctor_id)
        .bind(new.scheduled_at)
        .bind(&new.reason)
        .bind(BookingStatus::Pending.as_str())
        .bind(now)
        .fetch_one(&self.pool)
        .await?;
        observe(APPOINTMENTS.name, "create", start);
        appointment_from_row(&row)
    }

    /// Move the appointment from `from` to `to`. Notes are only replaced when given.
    /// `None` when the row is missing or no longer in `from`.
    pub async fn set_status(
        &self,
        id: Uuid,
        from: BookingStatus,
        to: BookingStatus,
        notes: Option<&str>,
    ) -> Result<Option<Appointment>> {
        let row = sqlx::query(&format!(
            r#"
            UPDATE appointments SET
                status = $2,
                notes = COALESCE($3, notes),
                updated_at = now()
            WHERE id = $1 AND status = $4
            RETURNING {APPOINTMENT_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(to.as_str())
        .bind(notes)
        .bind(from.as_str())
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(appointment_from_row).transpose()
    }

    pub async fn delete(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM appointments WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

fn appointment_from_row(row: &PgRow) -> Result<Appointment> {
    let status: String = row.try_get("status")?;
    Ok(Appointment {
        id: row.try_get("id")?,
        patient_id: row.try_get("patient_id")?,
        doctor_id: row.try_get("doctor_id")?,
        scheduled_at: row.try_get("scheduled_at")?,
        reason: row.try_get("reason")?,
        status: status
            .parse()
            .map_err(|e| Error::Internal(format!("stored appointment has {e}")))?,
        notes: row.try_get("notes")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}
