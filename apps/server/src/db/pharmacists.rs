//! Pharmacist repository

use chrono::Utc;
use sqlx::{postgres::PgRow, PgConnection, PgPool, Row};
use uuid::Uuid;

use super::document::{Column, ColumnType, EntityDef, Relation};
use super::query::FindQuery;
use super::users::users;
use crate::{
    models::{Pharmacist, PharmacistProfile, PharmacistUpdate},
    Result,
};

pub static PHARMACISTS: EntityDef = EntityDef {
    name: "Pharmacist",
    table: "pharmacists",
    columns: &[
        Column::new("id", ColumnType::Uuid),
        Column::new("user_id", ColumnType::Uuid).alias("user"),
        Column::new("pharmacy_name", ColumnType::Text).alias("pharmacyName"),
        Column::new("license_number", ColumnType::Text).alias("licenseNumber"),
        Column::new("address", ColumnType::Text),
        Column::new("created_at", ColumnType::Timestamp).alias("createdAt"),
        Column::new("updated_at", ColumnType::Timestamp).alias("updatedAt"),
    ],
    relations: &[Relation {
        path: "user",
        local_key: "user_id",
        target: users,
    }],
    default_sort: "pharmacy_name",
};

pub(crate) fn pharmacists() -> &'static EntityDef {
    &PHARMACISTS
}

const PHARMACIST_COLUMNS: &str =
    "id, user_id, pharmacy_name, license_number, address, created_at, updated_at";

#[derive(Clone)]
pub struct PharmacistRepository {
    pool: PgPool,
}

impl PharmacistRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn find(&self) -> FindQuery {
        FindQuery::new(&PHARMACISTS)
    }

    pub fn find_by_id(&self, id: Uuid) -> FindQuery {
        self.find().by_id(id)
    }

    pub async fn get(&self, id: Uuid) -> Result<Option<Pharmacist>> {
        let row = sqlx::query(&format!(
            "SELECT {PHARMACIST_COLUMNS} FROM pharmacists WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(pharmacist_from_row).transpose()
    }

    pub async fn get_by_user(&self, user_id: Uuid) -> Result<Option<Pharmacist>> {
        let row = sqlx::query(&format!(
            "SELECT {PHARMACIST_COLUMNS} FROM pharmacists WHERE user_id = $1"
        ))
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(pharmacist_from_row).transpose()
    }

    pub async fn update(&self, id: Uuid, patch: &PharmacistUpdate) -> Result<Option<Pharmacist>> {
        let row = sqlx::query(&format!(
            r#"
            UPDATE pharmacists SET
                pharmacy_name = COALESCE($2, pharmacy_name),
                address = COALESCE($3, address),
                updated_at = now()
            WHERE id = $1
            RETURNING {PHARMACIST_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(&patch.pharmacy_name)
        .bind(&patch.address)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(pharmacist_from_row).transpose()
    }
}

pub(crate) async fn insert_pharmacist(
    conn: &mut PgConnection,
    user_id: Uuid,
    profile: &PharmacistProfile,
) -> Result<Pharmacist> {
    let now = Utc::now();
    let row = sqlx::query(&format!(
        r#"
        INSERT INTO pharmacists (id, user_id, pharmacy_name, license_number, address,
                                 created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $6)
        RETURNING {PHARMACIST_COLUMNS}
        "#
    ))
    .bind(Uuid::new_v4())
    .bind(user_id)
    .bind(profile.pharmacy_name.trim())
    .bind(profile.license_number.trim())
    .bind(&profile.address)
    .bind(now)
    .fetch_one(&mut *conn)
    .await?;
    pharmacist_from_row(&row)
}

fn pharmacist_from_row(row: &PgRow) -> Result<Pharmacist> {
    Ok(Pharmacist {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        pharmacy_name: row.try_get("pharmacy_name")?,
        license_number: row.try_get("license_number")?,
        address: row.try_get("address")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}
