//! Lab booking repository

use chrono::Utc;
use sqlx::{postgres::PgRow, PgPool, Row};
use std::time::Instant;
use uuid::Uuid;

use super::document::{Column, ColumnType, EntityDef, Relation};
use super::lab_techniques::lab_techniques;
use super::observe;
use super::query::FindQuery;
use super::users::users;
use crate::{
    models::{BookingStatus, LabBooking, NewLabBooking},
    Error, Result,
};

pub static LAB_BOOKINGS: EntityDef = EntityDef {
    name: "LabBooking",
    table: "lab_bookings",
    columns: &[
        Column::new("id", ColumnType::Uuid),
        Column::new("user_id", ColumnType::Uuid).alias("user"),
        Column::new("lab_technique_id", ColumnType::Uuid).alias("labTechnique"),
        Column::new("scheduled_at", ColumnType::Timestamp).alias("date"),
        Column::new("status", ColumnType::Text),
        Column::new("result_notes", ColumnType::Text).alias("resultNotes"),
        Column::new("created_at", ColumnType::Timestamp).alias("createdAt"),
        Column::new("updated_at", ColumnType::Timestamp).alias("updatedAt"),
    ],
    relations: &[
        Relation {
            path: "user",
            local_key: "user_id",
            target: users,
        },
        Relation {
            path: "labTechnique",
            local_key: "lab_technique_id",
            target: lab_techniques,
        },
    ],
    default_sort: "scheduled_at",
};

const BOOKING_COLUMNS: &str = "id, user_id, lab_technique_id, scheduled_at, status, \
                               result_notes, created_at, updated_at";

#[derive(Clone)]
pub struct LabBookingRepository {
    pool: PgPool,
}

impl LabBookingRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn find(&self) -> FindQuery {
        FindQuery::new(&LAB_BOOKINGS)
    }

    pub fn find_by_id(&self, id: Uuid) -> FindQuery {
        self.find().by_id(id)
    }

    pub async fn get(&self, id: Uuid) -> Result<Option<LabBooking>> {
        let row = sqlx::query(&format!(
            "SELECT {BOOKING_COLUMNS} FROM lab_bookings WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(booking_from_row).transpose()
    }

    pub async fn create(&self, user_id: Uuid, new: &NewLabBooking) -> Result<LabBooking> {
        let start = Instant::now();
        let now = Utc::now();
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO lab_bookings (id, user_id, lab_technique_id, scheduled_at, status,
                                      created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $6)
            RETURNING {BOOKING_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(new.lab_technique_id)
        .bind(new.scheduled_at)
        .bind(BookingStatus::Pending.as_str())
        .bind(now)
        .fetch_one(&self.pool)
        .await?;
        observe(LAB_BOOKINGS.name, "create", start);
        booking_from_row(&row)
    }

    /// Move the booking from `from` to `to`. `None` when the row is missing or
    /// no longer in `from`.
    pub async fn set_status(
        &self,
        id: Uuid,
        from: BookingStatus,
        to: BookingStatus,
        result_notes: Option<&str>,
    ) -> Result<Option<LabBooking>> {
        let row = sqlx::query(&format!(
            r#"
            UPDATE lab_bookings SET
                status = $2,
                result_notes = COALESCE($3, result_notes),
                updated_at = now()
            WHERE id = $1 AND status = $4
            RETURNING {BOOKING_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(to.as_str())
        .bind(result_notes)
        .bind(from.as_str())
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(booking_from_row).transpose()
    }

    pub async fn delete(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM lab_bookings WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

fn booking_from_row(row: &PgRow) -> Result<LabBooking> {
    let status: String = row.try_get("status")?;
    Ok(LabBooking {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        lab_technique_id: row.try_get("lab_technique_id")?,
        scheduled_at: row.try_get("scheduled_at")?,
        status: status
            .parse()
            .map_err(|e| Error::Internal(format!("stored lab booking has {e}")))?,
        result_notes: row.try_get("result_notes")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}
