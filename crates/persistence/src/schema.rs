//! Database schema definitions

/// SQL to create all tables
/// NOTE: alert prices are stored as TEXT to preserve rust_decimal::Decimal precision
pub const CREATE_TABLES: &str = r#"
-- Account holders (alert owners and notification recipients)
CREATE TABLE IF NOT EXISTS users (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    email TEXT NOT NULL UNIQUE,
    full_name TEXT NOT NULL,
    created_at INTEGER DEFAULT (strftime('%s', 'now'))
);

-- Price alerts polled by the alert watcher
CREATE TABLE IF NOT EXISTS price_alerts (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    symbol TEXT NOT NULL,
    target_price TEXT NOT NULL,
    condition TEXT NOT NULL CHECK (condition IN ('ABOVE', 'BELOW')),
    status TEXT NOT NULL DEFAULT 'ACTIVE' CHECK (status IN ('ACTIVE', 'TRIGGERED')),
    triggered_price TEXT,
    triggered_at INTEGER,
    created_at INTEGER DEFAULT (strftime('%s', 'now'))
);

-- ========== INDEXES ==========

CREATE INDEX IF NOT EXISTS idx_alerts_user ON price_alerts(user_id);
CREATE INDEX IF NOT EXISTS idx_alerts_status ON price_alerts(status)
"#;

pub const STATUS_ACTIVE: &str = "ACTIVE";
pub const STATUS_TRIGGERED: &str = "TRIGGERED";
