//! Doctor repository

use chrono::Utc;
use sqlx::{postgres::PgRow, PgConnection, PgPool, Row};
use uuid::Uuid;

use super::document::{Column, ColumnType, EntityDef, Relation};
use super::query::FindQuery;
use super::users::users;
use crate::{
    models::{Doctor, DoctorProfile, DoctorUpdate},
    Result,
};

pub static DOCTORS: EntityDef = EntityDef {
    name: "Doctor",
    table: "doctors",
    columns: &[
        Column::new("id", ColumnType::Uuid),
        Column::new("user_id", ColumnType::Uuid).alias("user"),
        Column::new("specialization", ColumnType::Text),
        Column::new("qualification", ColumnType::Text),
        Column::new("experience_years", ColumnType::Integer).alias("experience"),
        Column::new("consultation_fee", ColumnType::Integer).alias("fees"),
        Column::new("available", ColumnType::Bool),
        Column::new("bio", ColumnType::Text),
        Column::new("created_at", ColumnType::Timestamp).alias("createdAt"),
        Column::new("updated_at", ColumnType::Timestamp).alias("updatedAt"),
    ],
    relations: &[Relation {
        path: "user",
        local_key: "user_id",
        target: users,
    }],
    default_sort: "specialization",
};

pub(crate) fn doctors() -> &'static EntityDef {
    &DOCTORS
}

const DOCTOR_COLUMNS: &str = "id, user_id, specialization, qualification, experience_years, \
                              consultation_fee, available, bio, created_at, updated_at";

#[derive(Clone)]
pub struct DoctorRepository {
    pool: PgPool,
}

impl DoctorRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn find(&self) -> FindQuery {
        FindQuery::new(&DOCTORS)
    }

    pub fn find_by_id(&self, id: Uuid) -> FindQuery {
        self.find().by_id(id)
    }

    pub async fn get(&self, id: Uuid) -> Result<Option<Doctor>> {
        let row = sqlx::query(&format!("SELECT {DOCTOR_COLUMNS} FROM doctors WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(doctor_from_row).transpose()
    }

    /// The doctor profile owned by a user account.
    pub async fn get_by_user(&self, user_id: Uuid) -> Result<Option<Doctor>> {
        let row = sqlx::query(&format!(
            "SELECT {DOCTOR_COLUMNS} FROM doctors WHERE user_id = $1"
        ))
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(doctor_from_row).transpose()
    }

    pub async fn update(&self, id: Uuid, patch: &DoctorUpdate) -> Result<Option<Doctor>> {
        let row = sqlx::query(&format!(
            r#"
            UPDATE doctors SET
                specialization = COALESCE($2, specialization),
                qualification = COALESCE($3, qualification),
                experience_years = COALESCE($4, experience_years),
                consultation_fee = COALESCE($5, consultation_fee),
                available = COALESCE($6, available),
                bio = COALESCE($7, bio),
                updated_at = now()
            WHERE id = $1
            RETURNING {DOCTOR_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(&patch.specialization)
        .bind(&patch.qualification)
        .bind(patch.experience_years)
        .bind(patch.consultation_fee)
        .bind(patch.available)
        .bind(&patch.bio)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(doctor_from_row).transpose()
    }
}

pub(crate) async fn insert_doctor(
    conn: &mut PgConnection,
    user_id: Uuid,
    profile: &DoctorProfile,
) -> Result<Doctor> {
    let now = Utc::now();
    let row = sqlx::query(&format!(
        r#"
        INSERT INTO doctors (id, user_id, specialization, qualification, experience_years,
                             consultation_fee, available, bio, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, TRUE, $7, $8, $8)
        RETURNING {DOCTOR_COLUMNS}
        "#
    ))
    .bind(Uuid::new_v4())
    .bind(user_id)
    .bind(profile.specialization.trim())
    .bind(&profile.qualification)
    .bind(profile.experience_years)
    .bind(profile.consultation_fee)
    .bind(&profile.bio)
    .bind(now)
    .fetch_one(&mut *conn)
    .await?;
    doctor_from_row(&row)
}

fn doctor_from_row(row: &PgRow) -> Result<Doctor> {
    Ok(Doctor {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        specialization: row.try_get("specialization")?,
        qualification: row.try_get("qualification")?,
        experience_years: row.try_get("experience_years")?,
        consultation_fee: row.try_get("consultation_fee")?,
        available: row.try_get("available")?,
        bio: row.try_get("bio")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}
