//! Runtime configuration from environment variables (after `.env` is loaded)

use axum::http::HeaderValue;
use engine::alerts::{DEFAULT_POLL_INTERVAL, DEFAULT_TRIGGER_TTL};
use engine::{RetryPolicy, SmtpConfig};
use std::time::Duration;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tracing::warn;

const DEFAULT_DB_PATH: &str = "data/stockcast.db";

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub db_path: String,
    /// Empty means any origin
    pub cors_origins: Vec<String>,
    pub alert_poll_interval: Duration,
    pub trigger_ttl: Duration,
    pub retry: RetryPolicy,
    pub smtp: Option<SmtpConfig>,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let number = |key: &str, default: u64| -> u64 {
            match get(key) {
                Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
                    warn!(key, value = %raw, default, "Ignoring non-numeric setting");
                    default
                }),
                None => default,
            }
        };

        let cors_origins = get("CORS_ORIGINS")
            .map(|raw| {
                raw.split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty() && s != "*")
                    .collect()
            })
            .unwrap_or_default();

        let defaults = RetryPolicy::default();
        let retry = RetryPolicy {
            max_attempts: number("PROVIDER_MAX_ATTEMPTS", defaults.max_attempts as u64).max(1)
                as u32,
            initial_backoff: Duration::from_millis(number(
                "PROVIDER_BACKOFF_MS",
                defaults.initial_backoff.as_millis() as u64,
            )),
            multiplier: defaults.multiplier,
        };

        Self {
            db_path: get("STOCKCAST_DB_PATH").unwrap_or_else(|| DEFAULT_DB_PATH.to_string()),
            cors_origins,
            alert_poll_interval: Duration::from_secs(
                number("ALERT_POLL_SECS", DEFAULT_POLL_INTERVAL.as_secs()).max(1),
            ),
            trigger_ttl: Duration::from_secs(
                number("ALERT_TRIGGER_TTL_HOURS", DEFAULT_TRIGGER_TTL.as_secs() / 3600)
                    .saturating_mul(3600),
            ),
            retry,
            smtp: SmtpConfig::from_lookup(&lookup),
        }
    }

    /// Configured origins, or any origin when none (or only invalid ones) are set
    pub fn cors_layer(&self) -> CorsLayer {
        let origins: Vec<HeaderValue> = self
            .cors_origins
            .iter()
            .filter_map(|origin| match origin.parse::<HeaderValue>() {
                Ok(value) => Some(value),
                Err(_) => {
                    warn!(origin = %origin, "Skipping invalid CORS origin");
                    None
                }
            })
            .collect();

        let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
        if origins.is_empty() {
            layer.allow_origin(Any)
        } else {
            layer.allow_origin(AllowOrigin::list(origins))
        }
    }
}
