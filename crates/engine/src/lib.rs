//! Stockcast Engine - forecasting, market data and price alerts
//!
//! Provides:
//! - RSI / SMA indicators over daily closes
//! - Linear trend + bagged tree forest ensemble with blended forecasts
//! - Confidence scoring and a trend/RSI verdict table
//! - Yahoo chart API client behind a retrying `HistoryProvider`
//! - Quotes with a static fallback table, chart rows and comparisons
//! - Price alert watcher with email notification and a TTL trigger log

pub mod alerts;
pub mod api;
pub mod error;
pub mod fallback;
pub mod forecast;
pub mod indicators;
pub mod market;
pub mod models;
pub mod notify;
pub mod provider;
pub mod store;
pub mod types;
pub mod verdict;

// Re-exports for convenience
pub use alerts::{
    check_alerts_once, create_alert, run_alert_watcher, AlertCondition, AlertError, CycleReport,
    TriggerLog, TriggeredAlert,
};
pub use api::YahooClient;
pub use error::ForecastError;
pub use forecast::{forecast_from_history, run_forecast, ModelEnsemble};
pub use indicators::IndicatorSet;
pub use market::{
    chart_history, compare, fetch_quote, Comparison, HistoryRow, Quote, QuoteError, StockSnapshot,
};
pub use models::{FitError, ForestConfig, LinearTrend, RandomForest};
pub use notify::{notifier_from_config, LogNotifier, Notifier, NotifyError, SmtpConfig, SmtpNotifier};
pub use provider::{HistoryProvider, RetryPolicy, RetryingProvider, SymbolProfile};
pub use store::TtlStore;
pub use types::*;
pub use verdict::classify;
