//! User repository

use chrono::Utc;
use sqlx::{postgres::PgRow, PgConnection, PgPool, Row};
use std::time::Instant;
use uuid::Uuid;

use super::document::{Column, ColumnType, EntityDef};
use super::query::FindQuery;
use super::{doctors, observe, pharmacists};
use crate::{
    models::{user::normalize_email, Doctor, NewUser, Pharmacist, User, UserUpdate},
    Error, Result,
};

pub static USERS: EntityDef = EntityDef {
    name: "User",
    table: "users",
    columns: &[
        Column::new("id", ColumnType::Uuid),
        Column::new("name", ColumnType::Text),
        Column::new("email", ColumnType::Text),
        Column::new("password_hash", ColumnType::Text).hidden(),
        Column::new("role", ColumnType::Text),
        Column::new("phone", ColumnType::Text),
        Column::new("gender", ColumnType::Text),
        Column::new("date_of_birth", ColumnType::Date).alias("dateOfBirth"),
        Column::new("address", ColumnType::Text),
        Column::new("created_at", ColumnType::Timestamp).alias("createdAt"),
        Column::new("updated_at", ColumnType::Timestamp).alias("updatedAt"),
    ],
    relations: &[],
    default_sort: "-created_at",
};

pub(crate) fn users() -> &'static EntityDef {
    &USERS
}

const USER_COLUMNS: &str = "id, name, email, password_hash, role, phone, gender, \
                            date_of_birth, address, created_at, updated_at";

/// A freshly registered user plus the role profile created with it.
#[derive(Debug, Clone)]
pub struct Registration {
    pub user: User,
    pub doctor: Option<Doctor>,
    pub pharmacist: Option<Pharmacist>,
}

#[derive(Clone)]
pub struct UserRepository {
    pool: PgPool,
}

impl UserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn find(&self) -> FindQuery {
        FindQuery::new(&USERS)
    }

    pub fn find_by_id(&self, id: Uuid) -> FindQuery {
        self.find().by_id(id)
    }

    pub async fn get(&self, id: Uuid) -> Result<Option<User>> {
        let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(user_from_row).transpose()
    }

    pub async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1"))
            .bind(normalize_email(email))
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(user_from_row).transpose()
    }

    /// Create the user and, for doctors and pharmacists, their profile row
    /// in a single transaction.
    pub async fn register(&self, new: &NewUser, password_hash: &str) -> Result<Registration> {
        let start = Instant::now();
        let mut tx = self.pool.begin().await?;

        let user = insert_user(&mut tx, new, password_hash).await?;
        let doctor = match &new.doctor {
            Some(profile) if user.role == crate::models::Role::Doctor => {
                Some(doctors::insert_doctor(&mut tx, user.id, profile).await?)
            }
            _ => None,
        };
        let pharmacist = match &new.pharmacist {
            Some(profile) if user.role == crate::models::Role::Pharmacist => {
                Some(pharmacists::insert_pharmacist(&mut tx, user.id, profile).await?)
            }
            _ => None,
        };

        tx.commit().await?;
        observe(USERS.name, "register", start);

        Ok(Registration {
            user,
            doctor,
            pharmacist,
        })
    }

    pub async fn update(&self, id: Uuid, patch: &UserUpdate) -> Result<Option<User>> {
        let row = sqlx::query(&format!(
            r#"
            UPDATE users SET
                name = COALESCE($2, name),
                phone = COALESCE($3, phone),
                gender = COALESCE($4, gender),
                date_of_birth = COALESCE($5, date_of_birth),
                address = COALESCE($6, address),
                updated_at = now()
            WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(&patch.name)
        .bind(&patch.phone)
        .bind(&patch.gender)
        .bind(patch.date_of_birth)
        .bind(&patch.address)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(user_from_row).transpose()
    }

    pub async fn delete(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

async fn insert_user(conn: &mut PgConnection, new: &NewUser, password_hash: &str) -> Result<User> {
    let now = Utc::now();
    let row = sqlx::query(&format!(
        r#"
        INSERT INTO users (id, name, email, password_hash, role, phone, gender,
                           date_of_birth, address, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $10)
        RETURNING {USER_COLUMNS}
        "#
    ))
    .bind(Uuid::new_v4())
    .bind(new.name.trim())
    .bind(new.normalized_email())
    .bind(password_hash)
    .bind(new.role.as_str())
    .bind(&new.phone)
    .bind(&new.gender)
    .bind(new.date_of_birth)
    .bind(&new.address)
    .bind(now)
    .fetch_one(&mut *conn)
    .await?;
    user_from_row(&row)
}

fn user_from_row(row: &PgRow) -> Result<User> {
    let role: String = row.try_get("role")?;
    Ok(User {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        email: row.try_get("email")?,
        password_hash: row.try_get("password_hash")?,
        role: role
            .parse()
            .map_err(|e| Error::Internal(format!("stored user has {e}")))?,
        phone: row.try_get("phone")?,
        gender: row.try_get("gender")?,
        date_of_birth: row.try_get("date_of_birth")?,
        address: row.try_get("address")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}
