//! Price alerts: validation, condition checks and the polling watcher
//!
//! Every cycle scans ACTIVE alerts in creation order, fetches the latest close
//! for each, and for every alert whose condition holds: notifies the owner,
//! flips the alert to TRIGGERED and records it in the recent-trigger log.

use crate::market::normalize_symbol;
use crate::notify::Notifier;
use crate::provider::HistoryProvider;
use crate::store::TtlStore;
use crate::types::Lookback;
use chrono::{DateTime, Utc};
use persistence::repository::{AlertRecord, AlertRepository, NewAlert, UserRepository};
use persistence::{DbError, SqlitePool};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, info, warn};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);
pub const DEFAULT_TRIGGER_TTL: Duration = Duration::from_secs(24 * 60 * 60);
const ALERT_LOOKBACK: Lookback = Lookback::OneDay;

/// Recently triggered alerts keyed by alert id
pub type TriggerLog = TtlStore<i64, TriggeredAlert>;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum AlertError {
    #[error("unknown alert condition {0:?}, expected ABOVE or BELOW")]
    InvalidCondition(String),

    #[error("target price must be positive, got {0}")]
    InvalidTarget(Decimal),

    #[error("invalid symbol: {0:?}")]
    InvalidSymbol(String),

    #[error("user {0} not found")]
    UnknownUser(i64),

    #[error(transparent)]
    Db(#[from] DbError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AlertCondition {
    Above,
    Below,
}

impl AlertCondition {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertCondition::Above => "ABOVE",
            AlertCondition::Below => "BELOW",
        }
    }

    /// Inclusive on both sides: touching the target triggers
    pub fn is_met(&self, price: Decimal, target: Decimal) -> bool {
        match self {
            AlertCondition::Above => price >= target,
            AlertCondition::Below => price <= target,
        }
    }
}

impl FromStr for AlertCondition {
    type Err = AlertError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ABOVE" => Ok(AlertCondition::Above),
            "BELOW" => Ok(AlertCondition::Below),
            _ => Err(AlertError::InvalidCondition(s.to_string())),
        }
    }
}

impl fmt::Display for AlertCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A trigger as reported by `/api/triggers`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TriggeredAlert {
    pub alert_id: i64,
    pub user_id: i64,
    pub symbol: String,
    pub condition: AlertCondition,
    pub target_price: Decimal,
    pub price: Decimal,
    pub triggered_at: DateTime<Utc>,
}

/// Counters for one watcher pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub checked: usize,
    pub triggered: usize,
    pub failed: usize,
}

// ---------------------------------------------------------------------------
// Creation
// ---------------------------------------------------------------------------

/// Validate and store a new ACTIVE alert for an existing user
pub async fn create_alert(
    pool: &SqlitePool,
    user_id: i64,
    symbol: &str,
    target_price: Decimal,
    condition: &str,
) -> Result<AlertRecord, AlertError> {
    let condition: AlertCondition = condition.parse()?;
    if target_price <= Decimal::ZERO {
        return Err(AlertError::InvalidTarget(target_price));
    }
    let symbol =
        normalize_symbol(symbol).map_err(|_| AlertError::InvalidSymbol(symbol.to_string()))?;

    if UserRepository::new(pool).get(user_id).await?.is_none() {
        return Err(AlertError::UnknownUser(user_id));
    }

    let repo = AlertRepository::new(pool);
    let id = repo
        .create(&NewAlert {
            user_id,
            symbol,
            target_price,
            condition: condition.as_str().to_string(),
        })
        .await?;

    let record = repo
        .get(id)
        .await?
        .ok_or_else(|| DbError::Query(format!("alert {id} vanished after insert")))?;

    info!(alert_id = id, user_id, symbol = %record.symbol, %condition, %target_price, "Alert created");
    Ok(record)
}

// ---------------------------------------------------------------------------
// Watcher
// ---------------------------------------------------------------------------

/// Poll forever: one pass over the ACTIVE alerts, then sleep `interval`.
pub async fn run_alert_watcher(
    provider: &dyn HistoryProvider,
    notifier: &dyn Notifier,
    triggers: &TriggerLog,
    db_pool: SqlitePool,
    interval: Duration,
) {
    info!(
        interval_secs = interval.as_secs(),
        notifier = notifier.name(),
        "Alert watcher starting"
    );

    loop {
        match check_alerts_once(provider, notifier, triggers, &db_pool).await {
            Ok(report) if report.checked > 0 => info!(
                checked = report.checked,
                triggered = report.triggered,
                failed = report.failed,
                "Alert cycle complete"
            ),
            Ok(_) => debug!("No active alerts"),
            Err(e) => error!(error = %e, "Alert cycle failed"),
        }

        let purged = triggers.purge_expired();
        if purged > 0 {
            debug!(purged, "Expired triggers removed");
        }

        tokio::time::sleep(interval).await;
    }
}

/// One sequential pass over the ACTIVE alerts.
///
/// Per-alert failures are logged and counted; only a failure to list the
/// alerts aborts the pass.
pub async fn check_alerts_once(
    provider: &dyn HistoryProvider,
    notifier: &dyn Notifier,
    triggers: &TriggerLog,
    db_pool: &SqlitePool,
) -> anyhow::Result<CycleReport> {
    let active = AlertRepository::new(db_pool).list_active().await?;
    let mut report = CycleReport::default();

    for alert in &active {
        report.checked += 1;
        match check_alert(provider, notifier, db_pool, alert).await {
            Ok(Some(triggered)) => {
                report.triggered += 1;
                triggers.insert(triggered.alert_id, triggered);
            }
            Ok(None) => {}
            Err(e) => {
                report.failed += 1;
                warn!(alert_id = alert.id, symbol = %alert.symbol, error = %e, "Failed to check alert");
            }
        }
    }

    Ok(report)
}

async fn check_alert(
    provider: &dyn HistoryProvider,
    notifier: &dyn Notifier,
    db_pool: &SqlitePool,
    alert: &AlertRecord,
) -> anyhow::Result<Option<TriggeredAlert>> {
    let condition: AlertCondition = alert.condition.parse()?;
    let target = alert
        .target()
        .ok_or_else(|| anyhow::anyhow!("unparseable target price {:?}", alert.target_price))?;

    let series = provider.fetch_history(&alert.symbol, ALERT_LOOKBACK).await?;
    let Some(last) = series.last() else {
        debug!(symbol = %alert.symbol, "No data for alert symbol");
        return Ok(None);
    };
    let price = Decimal::from_f64_retain(last.close)
        .ok_or_else(|| anyhow::anyhow!("non-finite close {}", last.close))?;

    debug!(
        alert_id = alert.id,
        symbol = %alert.symbol,
        %price,
        %target,
        %condition,
        "Checking alert"
    );

    if !condition.is_met(price, target) {
        return Ok(None);
    }

    let price = price.round_dp(2);
    info!(alert_id = alert.id, symbol = %alert.symbol, %price, %target, "Alert triggered");

    match UserRepository::new(db_pool).get(alert.user_id).await? {
        Some(user) => {
            let subject = format!("Stock Alert: {} hit {}", alert.symbol, price);
            let body = format!(
                "Hello {},\n\nYour alert for {} has been triggered!\n\n\
                 Current Price: {}\nTarget: {} ({})\n\nHappy Trading!",
                user.full_name, alert.symbol, price, target, condition
            );
            if let Err(e) = notifier.send(&user.email, &subject, &body).await {
                warn!(alert_id = alert.id, notifier = notifier.name(), error = %e, "Notification failed");
            }
        }
        None => warn!(alert_id = alert.id, user_id = alert.user_id, "Alert owner missing"),
    }

    if !AlertRepository::new(db_pool)
        .mark_triggered(alert.id, price)
        .await?
    {
        // Already flipped by a concurrent pass
        return Ok(None);
    }

    Ok(Some(TriggeredAlert {
        alert_id: alert.id,
        user_id: alert.user_id,
        symbol: alert.symbol.clone(),
        condition,
        target_price: target,
        price,
        triggered_at: Utc::now(),
    }))
}
