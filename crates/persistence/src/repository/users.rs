//! User repository - account holders that own price alerts

use crate::{conflict_or, DbResult};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};

/// A persisted user account
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct UserRecord {
    pub id: i64,
    pub email: String,
    pub full_name: String,
    pub created_at: Option<i64>,
}

/// Repository for user accounts
pub struct UserRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> UserRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a new user. Fails with `DbError::Conflict` if the email is taken.
    pub async fn create(&self, email: &str, full_name: &str) -> DbResult<UserRecord> {
        let result = sqlx::query("INSERT INTO users (email, full_name) VALUES (?1, ?2)")
            .bind(email)
            .bind(full_name)
            .execute(self.pool)
            .await
            .map_err(|e| conflict_or(e, "email"))?;

        let id = result.last_insert_rowid();
        let record = sqlx::query_as::<_, UserRecord>("SELECT * FROM users WHERE id = ?1")
            .bind(id)
            .fetch_one(self.pool)
            .await?;

        Ok(record)
    }

    pub async fn get(&self, id: i64) -> DbResult<Option<UserRecord>> {
        let record = sqlx::query_as::<_, UserRecord>("SELECT * FROM users WHERE id = ?1")
            .bind(id)
            .fetch_optional(self.pool)
            .await?;

        Ok(record)
    }

    pub async fn get_by_email(&self, email: &str) -> DbResult<Option<UserRecord>> {
        let record = sqlx::query_as::<_, UserRecord>("SELECT * FROM users WHERE email = ?1")
            .bind(email)
            .fetch_optional(self.pool)
            .await?;

        Ok(record)
    }
}
