//! Price alert repository - storage for the alert watcher

use crate::schema::{STATUS_ACTIVE, STATUS_TRIGGERED};
use crate::DbResult;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};
use std::str::FromStr;

/// A persisted price alert
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AlertRecord {
    pub id: i64,
    pub user_id: i64,
    pub symbol: String,
    pub target_price: String,
    pub condition: String,
    pub status: String,
    pub triggered_price: Option<String>,
    pub triggered_at: Option<i64>,
    pub created_at: Option<i64>,
}

impl AlertRecord {
    /// Parsed target price; `None` if the stored text is not a valid decimal
    pub fn target(&self) -> Option<Decimal> {
        Decimal::from_str(&self.target_price).ok()
    }

    pub fn is_active(&self) -> bool {
        self.status == STATUS_ACTIVE
    }
}

/// Input for a new alert
#[derive(Debug, Clone)]
pub struct NewAlert {
    pub user_id: i64,
    pub symbol: String,
    pub target_price: Decimal,
    /// "ABOVE" or "BELOW"
    pub condition: String,
}

/// Repository for price alerts
pub struct AlertRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> AlertRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert an ACTIVE alert and return its id
    pub async fn create(&self, alert: &NewAlert) -> DbResult<i64> {
        let result = sqlx::query(
            r#"INSERT INTO price_alerts (user_id, symbol, target_price, condition, status)
               VALUES (?1, ?2, ?3, ?4, ?5)"#,
        )
        .bind(alert.user_id)
        .bind(&alert.symbol)
        .bind(alert.target_price.to_string())
        .bind(&alert.condition)
        .bind(STATUS_ACTIVE)
        .execute(self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    pub async fn get(&self, id: i64) -> DbResult<Option<AlertRecord>> {
        let record = sqlx::query_as::<_, AlertRecord>("SELECT * FROM price_alerts WHERE id = ?1")
            .bind(id)
            .fetch_optional(self.pool)
            .await?;

        Ok(record)
    }

    /// All alerts for a user, newest first
    pub async fn list_for_user(&self, user_id: i64) -> DbResult<Vec<AlertRecord>> {
        let records = sqlx::query_as::<_, AlertRecord>(
            "SELECT * FROM price_alerts WHERE user_id = ?1 ORDER BY id DESC",
        )
        .bind(user_id)
        .fetch_all(self.pool)
        .await?;

        Ok(records)
    }

    /// All ACTIVE alerts in creation order (one watcher cycle scans these)
    pub async fn list_active(&self) -> DbResult<Vec<AlertRecord>> {
        let records = sqlx::query_as::<_, AlertRecord>(
            "SELECT * FROM price_alerts WHERE status = ?1 ORDER BY id ASC",
        )
        .bind(STATUS_ACTIVE)
        .fetch_all(self.pool)
        .await?;

        Ok(records)
    }

    /// Flip ACTIVE -> TRIGGERED. Returns false if the alert was not active.
    pub async fn mark_triggered(&self, id: i64, price: Decimal) -> DbResult<bool> {
        let result = sqlx::query(
            r#"UPDATE price_alerts
               SET status = ?1, triggered_price = ?2, triggered_at = strftime('%s', 'now')
               WHERE id = ?3 AND status = ?4"#,
        )
        .bind(STATUS_TRIGGERED)
        .bind(price.to_string())
        .bind(id)
        .bind(STATUS_ACTIVE)
        .execute(self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
