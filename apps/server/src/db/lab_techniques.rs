//! Lab technique catalogue

use chrono::Utc;
use sqlx::{postgres::PgRow, PgPool, Row};
use uuid::Uuid;

use super::document::{Column, ColumnType, EntityDef};
use super::query::FindQuery;
use crate::{
    models::{LabTechnique, LabTechniqueUpdate, NewLabTechnique},
    Result,
};

pub static LAB_TECHNIQUES: EntityDef = EntityDef {
    name: "LabTechnique",
    table: "lab_techniques",
    columns: &[
        Column::new("id", ColumnType::Uuid),
        Column::new("name", ColumnType::Text),
        Column::new("description", ColumnType::Text),
        Column::new("price", ColumnType::Integer),
        Column::new("duration_minutes", ColumnType::Integer).alias("duration"),
        Column::new("available", ColumnType::Bool),
        Column::new("created_at", ColumnType::Timestamp).alias("createdAt"),
        Column::new("updated_at", ColumnType::Timestamp).alias("updatedAt"),
    ],
    relations: &[],
    default_sort: "name",
};

pub(crate) fn lab_techniques() -> &'static EntityDef {
    &LAB_TECHNIQUES
}

const TECHNIQUE_COLUMNS: &str =
    "id, name, description, price, duration_minutes, available, created_at, updated_at";

#[derive(Clone)]
pub struct LabTechniqueRepository {
    pool: PgPool,
}

impl LabTechniqueRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn find(&self) -> FindQuery {
        FindQuery::new(&LAB_TECHNIQUES)
    }

    pub fn find_by_id(&self, id: Uuid) -> FindQuery {
        self.find().by_id(id)
    }

    pub async fn get(&self, id: Uuid) -> Result<Option<LabTechnique>> {
        let row = sqlx::query(&format!(
            "SELECT {TECHNIQUE_COLUMNS} FROM lab_techniques WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(technique_from_row).transpose()
    }

    pub async fn create(&self, new: &NewLabTechnique) -> Result<LabTechnique> {
        let now = Utc::now();
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO lab_techniques (id, name, description, price, duration_minutes,
                                        available, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $7)
            RETURNING {TECHNIQUE_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(new.name.trim())
        .bind(&new.description)
        .bind(new.price)
        .bind(new.duration_minutes)
        .bind(new.available)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;
        technique_from_row(&row)
    }

    pub async fn update(&self, id: Uuid, patch: &LabTechniqueUpdate) -> Result<Option<LabTechnique>> {
        let row = sqlx::query(&format!(
            r#"
            UPDATE lab_techniques SET
                name = COALESCE($2, name),
                description = COALESCE($3, description),
                price = COALESCE($4, price),
                duration_minutes = COALESCE($5, duration_minutes),
                available = COALESCE($6, available),
                updated_at = now()
            WHERE id = $1
            RETURNING {TECHNIQUE_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(patch.name.as_deref().map(str::trim))
        .bind(&patch.description)
        .bind(patch.price)
        .bind(patch.duration_minutes)
        .bind(patch.available)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(technique_from_row).transpose()
    }

    pub async fn delete(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM lab_techniques WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

fn technique_from_row(row: &PgRow) -> Result<LabTechnique> {
    Ok(LabTechnique {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        price: row.try_get("price")?,
        duration_minutes: row.try_get("duration_minutes")?,
        available: row.try_get("available")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}
