//! Stockcast - stock forecasting and price alert API
//!
//! Usage:
//!   stockcast serve --port 8000        - Launch the HTTP API and alert watcher
//!   stockcast predict AAPL             - Forecast one symbol from the CLI
//!   stockcast quote TSLA               - Print the latest quote

mod config;
mod error;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use clap::{Parser, Subcommand};
use config::AppConfig;
use engine::market::normalize_symbol;
use engine::{
    chart_history, compare, create_alert, fetch_quote, notifier_from_config, run_alert_watcher,
    run_forecast, Comparison, Forecast, HistoryProvider, HistoryRow, Notifier, Quote,
    RetryingProvider, TriggerLog, TriggeredAlert, YahooClient,
};
use error::ApiError;
use persistence::repository::{AlertRecord, AlertRepository, UserRecord, UserRepository};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{error, info};

const APP_VERSION: &str = concat!(env!("CARGO_PKG_VERSION"), "-", env!("GIT_HASH"));

#[derive(Parser)]
#[command(name = "stockcast")]
#[command(about = "Stock forecasting and price alert API", long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Launch the API server and the alert watcher
    Serve {
        /// Host to bind to
        #[arg(long, default_value = "0.0.0.0")]
        host: String,
        /// Port to listen on
        #[arg(short, long, default_value_t = 8000)]
        port: u16,
    },
    /// Forecast a symbol from two years of daily history
    Predict {
        symbol: String,
        /// Print the full forecast as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print the latest quote for a symbol
    Quote { symbol: String },
}

#[derive(Clone)]
struct AppState {
    provider: Arc<dyn HistoryProvider>,
    db: Arc<persistence::Database>,
    notifier: Arc<dyn Notifier>,
    triggers: Arc<TriggerLog>,
}

fn init_logging(verbose: bool) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = if verbose {
        EnvFilter::new("debug,engine=debug,stockcast=debug")
    } else {
        EnvFilter::new("info,engine=info,stockcast=info")
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).compact())
        .with(filter)
        .init();
}

fn build_provider(config: &AppConfig) -> anyhow::Result<Arc<dyn HistoryProvider>> {
    let yahoo = YahooClient::new()?;
    Ok(Arc::new(RetryingProvider::new(yahoo, config.retry.clone())))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    dotenvy::dotenv().ok();
    let config = AppConfig::from_env();

    match cli.command {
        Commands::Serve { host, port } => {
            cmd_serve(&config, &host, port).await?;
        }
        Commands::Predict { symbol, json } => {
            cmd_predict(&config, &symbol, json).await?;
        }
        Commands::Quote { symbol } => {
            cmd_quote(&config, &symbol).await?;
        }
    }

    Ok(())
}

// ============================================================================
// Serve command - Axum web server
// ============================================================================

fn router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/health", get(api_health))
        .route("/stocks/predict", get(api_predict))
        .route("/stocks/quote", get(api_quote))
        .route("/stocks/history", get(api_history))
        .route("/stocks/compare", get(api_compare))
        .route("/users", post(api_create_user))
        .route("/users/:user_id", get(api_get_user))
        .route("/alerts/create", post(api_create_alert))
        .route("/alerts/:user_id", get(api_list_alerts))
        .route("/triggers", get(api_triggers))
        .with_state(state);

    Router::new()
        .route("/", get(api_root))
        .nest("/api", api_routes)
}

async fn cmd_serve(config: &AppConfig, host: &str, port: u16) -> anyhow::Result<()> {
    info!("Stockcast v{} starting...", APP_VERSION);

    let db = persistence::Database::new(&config.db_path)
        .await
        .map_err(|e| {
            error!("Failed to initialize database: {}", e);
            anyhow::anyhow!("Database initialization failed: {}", e)
        })?;
    info!("Database initialized: {}", config.db_path);

    let state = AppState {
        provider: build_provider(config)?,
        db: Arc::new(db),
        notifier: notifier_from_config(config.smtp.as_ref()),
        triggers: Arc::new(TriggerLog::new(config.trigger_ttl)),
    };

    let watcher_state = state.clone();
    let interval = config.alert_poll_interval;
    tokio::spawn(async move {
        run_alert_watcher(
            &*watcher_state.provider,
            &*watcher_state.notifier,
            &watcher_state.triggers,
            watcher_state.db.pool_clone(),
            interval,
        )
        .await;
    });

    let app = router(state).layer(config.cors_layer());

    let addr: std::net::SocketAddr = format!("{}:{}", host, port).parse()?;
    println!("\n=== Stockcast v{} ===", APP_VERSION);
    println!("Forecasting & Alerts API");
    println!("Listening on http://{}", addr);
    println!("\nEndpoints:");
    println!("  GET  /api/health                       - Health check");
    println!("  GET  /api/stocks/predict?symbol=       - 30-day forecast and verdict");
    println!("  GET  /api/stocks/quote?symbol=         - Latest quote");
    println!("  GET  /api/stocks/history?symbol=&range= - Chart rows with SMA-20/50");
    println!("  GET  /api/stocks/compare?symbol1=&symbol2= - Side-by-side comparison");
    println!("  POST /api/users                        - Create account");
    println!("  GET  /api/users/:user_id               - Fetch account");
    println!("  POST /api/alerts/create                - Set a price alert");
    println!("  GET  /api/alerts/:user_id              - List a user's alerts");
    println!("  GET  /api/triggers                     - Recently triggered alerts");
    println!("\n  Database: {}", config.db_path);
    println!(
        "  Alert poll: every {}s | Triggers kept {}h",
        interval.as_secs(),
        config.trigger_ttl.as_secs() / 3600
    );
    println!("\nPress Ctrl+C to stop\n");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// ============================================================================
// Predict / Quote commands - CLI mode (no web server)
// ============================================================================

async fn cmd_predict(config: &AppConfig, symbol: &str, json: bool) -> anyhow::Result<()> {
    let symbol = normalize_symbol(symbol)?;
    let provider = build_provider(config)?;
    let forecast = run_forecast(provider.as_ref(), &symbol).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&forecast)?);
        return Ok(());
    }

    println!("\n=== {} ===", forecast.symbol);
    println!(
        "Price: {:.2} | Next close: {:.2} | Trend: {:?}",
        forecast.current_price, forecast.next_close, forecast.trend
    );
    println!(
        "RSI: {:.2} | SMA-50: {:.2} | Confidence: {}%",
        forecast.rsi, forecast.sma, forecast.confidence
    );
    println!("Verdict: {} ({})", forecast.verdict, forecast.reason);
    println!(
        "Long term: 1mo {:.2} | 6mo {:.2} | 1y {:.2}",
        forecast.long_term.one_month, forecast.long_term.six_months, forecast.long_term.one_year
    );
    if let (Some(first), Some(last)) = (forecast.series.first(), forecast.series.last()) {
        println!(
            "Series: {} {:.2} -> {} {:.2} ({} days)",
            first.date,
            first.value,
            last.date,
            last.value,
            forecast.series.len()
        );
    }

    Ok(())
}

async fn cmd_quote(config: &AppConfig, symbol: &str) -> anyhow::Result<()> {
    let provider = build_provider(config)?;
    let quote = fetch_quote(provider.as_ref(), symbol).await?;

    println!(
        "{} ({}): {:.2} {:+.2} ({:+.2}%){}",
        quote.name,
        quote.symbol,
        quote.price,
        quote.change,
        quote.change_percent,
        if quote.fallback { " [cached]" } else { "" }
    );
    if quote.high_52w > 0.0 {
        println!("52w range: {:.2} - {:.2}", quote.low_52w, quote.high_52w);
    }

    Ok(())
}

// ============================================================================
// API Handlers - Stocks
// ============================================================================

#[derive(Deserialize)]
struct SymbolParams {
    symbol: String,
}

#[derive(Deserialize)]
struct HistoryParams {
    symbol: String,
    #[serde(default = "default_range")]
    range: String,
}

fn default_range() -> String {
    "6mo".to_string()
}

#[derive(Deserialize)]
struct CompareParams {
    symbol1: String,
    symbol2: String,
}

/// GET /
async fn api_root() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "message": "AI Stock Prediction API is Running" }))
}

/// GET /api/health
async fn api_health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "service": "stockcast",
        "version": APP_VERSION,
    }))
}

/// GET /api/stocks/predict - fit both models and forecast
async fn api_predict(
    State(state): State<AppState>,
    Query(params): Query<SymbolParams>,
) -> Result<Json<Forecast>, ApiError> {
    let symbol = normalize_symbol(&params.symbol)?;
    let forecast = run_forecast(state.provider.as_ref(), &symbol).await?;
    Ok(Json(forecast))
}

/// GET /api/stocks/quote
async fn api_quote(
    State(state): State<AppState>,
    Query(params): Query<SymbolParams>,
) -> Result<Json<Quote>, ApiError> {
    let quote = fetch_quote(state.provider.as_ref(), &params.symbol).await?;
    Ok(Json(quote))
}

/// GET /api/stocks/history - chart rows for the requested range
async fn api_history(
    State(state): State<AppState>,
    Query(params): Query<HistoryParams>,
) -> Result<Json<Vec<HistoryRow>>, ApiError> {
    let rows = chart_history(state.provider.as_ref(), &params.symbol, &params.range).await?;
    Ok(Json(rows))
}

/// GET /api/stocks/compare
async fn api_compare(
    State(state): State<AppState>,
    Query(params): Query<CompareParams>,
) -> Result<Json<Comparison>, ApiError> {
    let comparison = compare(state.provider.as_ref(), &params.symbol1, &params.symbol2).await?;
    Ok(Json(comparison))
}

// ============================================================================
// API Handlers - Users & Alerts
// ============================================================================

#[derive(Deserialize)]
struct CreateUserRequest {
    email: String,
    full_name: String,
}

#[derive(Deserialize)]
struct CreateAlertRequest {
    user_id: i64,
    symbol: String,
    target_price: Decimal,
    condition: String,
}

fn valid_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !email.chars().any(char::is_whitespace)
        }
        None => false,
    }
}

/// POST /api/users
async fn api_create_user(
    State(state): State<AppState>,
    Json(request): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<UserRecord>), ApiError> {
    let email = request.email.trim().to_lowercase();
    if !valid_email(&email) {
        return Err(ApiError::BadRequest(format!("Invalid email address: {}", request.email)));
    }
    let full_name = request.full_name.trim();
    if full_name.is_empty() {
        return Err(ApiError::BadRequest("full_name must not be empty".into()));
    }

    let user = UserRepository::new(state.db.pool())
        .create(&email, full_name)
        .await?;
    info!(user_id = user.id, "User created");
    Ok((StatusCode::CREATED, Json(user)))
}

/// GET /api/users/:user_id
async fn api_get_user(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
) -> Result<Json<UserRecord>, ApiError> {
    UserRepository::new(state.db.pool())
        .get(user_id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("User not found".into()))
}

/// POST /api/alerts/create
async fn api_create_alert(
    State(state): State<AppState>,
    Json(request): Json<CreateAlertRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let alert = create_alert(
        state.db.pool(),
        request.user_id,
        &request.symbol,
        request.target_price,
        &request.condition,
    )
    .await?;

    Ok(Json(serde_json::json!({
        "message": format!("Alert set for {} at {}", alert.symbol, alert.target_price),
        "alert": alert,
    })))
}

/// GET /api/alerts/:user_id
async fn api_list_alerts(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
) -> Result<Json<Vec<AlertRecord>>, ApiError> {
    let alerts = AlertRepository::new(state.db.pool())
        .list_for_user(user_id)
        .await?;
    Ok(Json(alerts))
}

/// GET /api/triggers - newest first
async fn api_triggers(State(state): State<AppState>) -> Json<Vec<TriggeredAlert>> {
    let mut triggers = state.triggers.values();
    triggers.sort_by(|a, b| b.triggered_at.cmp(&a.triggered_at));
    Json(triggers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::{Duration as ChronoDuration, NaiveDate, Utc};
    use engine::{AlertCondition, HistorySeries, Lookback, LogNotifier, PricePoint, Verdict};
    use rust_decimal_macros::dec;
    use std::time::Duration;

    struct StubProvider {
        closes: Vec<f64>,
    }

    #[async_trait]
    impl HistoryProvider for StubProvider {
        async fn fetch_history(
            &self,
            symbol: &str,
            _lookback: Lookback,
        ) -> anyhow::Result<HistorySeries> {
            let start = NaiveDate::from_ymd_opt(2023, 1, 2).unwrap();
            let points = self
                .closes
                .iter()
                .enumerate()
                .map(|(i, &c)| PricePoint {
                    date: start + ChronoDuration::days(i as i64),
                    open: c,
                    high: c,
                    low: c,
                    close: c,
                    volume: 1000.0,
                })
                .collect();
            Ok(HistorySeries::new(symbol, points))
        }

        fn name(&self) -> &'static str {
            "stub"
        }
    }

    async fn state_with(closes: Vec<f64>) -> AppState {
        AppState {
            provider: Arc::new(StubProvider { closes }),
            db: Arc::new(persistence::Database::in_memory().await.unwrap()),
            notifier: Arc::new(LogNotifier),
            triggers: Arc::new(TriggerLog::new(Duration::from_secs(60))),
        }
    }

    fn rising() -> Vec<f64> {
        (0..120).map(|i| 100.0 + i as f64 * 0.5).collect()
    }

    #[test]
    fn test_email_validation() {
        assert!(valid_email("trader@example.com"));
        assert!(!valid_email("trader.example.com"));
        assert!(!valid_email("@example.com"));
        assert!(!valid_email("trader@localhost"));
        assert!(!valid_email("a b@example.com"));
    }

    #[tokio::test]
    async fn test_predict_handler() {
        let state = state_with(rising()).await;
        let Json(forecast) = api_predict(
            State(state),
            Query(SymbolParams {
                symbol: "aapl".into(),
            }),
        )
        .await
        .unwrap();
        assert_eq!(forecast.symbol, "AAPL");
        assert_eq!(forecast.series.len(), 30);
        assert!(matches!(forecast.verdict, Verdict::StrongBuy | Verdict::Buy));
    }

    #[tokio::test]
    async fn test_predict_without_data_is_not_found() {
        let state = state_with(Vec::new()).await;
        let err = api_predict(
            State(state),
            Query(SymbolParams {
                symbol: "ZZZZ".into(),
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_invalid_symbol_is_bad_request() {
        let state = state_with(rising()).await;
        let err = api_predict(
            State(state),
            Query(SymbolParams {
                symbol: "DROP TABLE;".into(),
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_history_handler_uses_default_range() {
        let state = state_with(rising()).await;
        let Json(rows) = api_history(
            State(state),
            Query(HistoryParams {
                symbol: "AAPL".into(),
                range: default_range(),
            }),
        )
        .await
        .unwrap();
        assert_eq!(rows.len(), 120);
        assert_eq!(rows[0].sma50, 0.0);
        assert!(rows[119].sma50 > 0.0);
    }

    #[tokio::test]
    async fn test_user_and_alert_flow() {
        let state = state_with(rising()).await;

        let (status, Json(user)) = api_create_user(
            State(state.clone()),
            Json(CreateUserRequest {
                email: " Trader@Example.com ".into(),
                full_name: "Test Trader".into(),
            }),
        )
        .await
        .unwrap();
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(user.email, "trader@example.com");

        let duplicate = api_create_user(
            State(state.clone()),
            Json(CreateUserRequest {
                email: "trader@example.com".into(),
                full_name: "Someone Else".into(),
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(duplicate.status(), StatusCode::CONFLICT);

        let Json(body) = api_create_alert(
            State(state.clone()),
            Json(CreateAlertRequest {
                user_id: user.id,
                symbol: "tsla".into(),
                target_price: dec!(250.50),
                condition: "above".into(),
            }),
        )
        .await
        .unwrap();
        assert_eq!(body["message"], "Alert set for TSLA at 250.50");
        assert_eq!(body["alert"]["condition"], "ABOVE");

        let Json(alerts) = api_list_alerts(State(state.clone()), Path(user.id))
            .await
            .unwrap();
        assert_eq!(alerts.len(), 1);
        assert!(alerts[0].is_active());

        let missing = api_get_user(State(state), Path(user.id + 1))
            .await
            .unwrap_err();
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_alert_for_unknown_user_is_not_found() {
        let state = state_with(rising()).await;
        let err = api_create_alert(
            State(state),
            Json(CreateAlertRequest {
                user_id: 42,
                symbol: "AAPL".into(),
                target_price: dec!(100),
                condition: "BELOW".into(),
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_triggers_newest_first() {
        let state = state_with(rising()).await;
        let now = Utc::now();
        for (id, age) in [(1, 30), (2, 5), (3, 60)] {
            state.triggers.insert(
                id,
                TriggeredAlert {
                    alert_id: id,
                    user_id: 1,
                    symbol: "AAPL".into(),
                    condition: AlertCondition::Above,
                    target_price: dec!(100),
                    price: dec!(101),
                    triggered_at: now - ChronoDuration::seconds(age),
                },
            );
        }

        let Json(triggers) = api_triggers(State(state)).await;
        let ids: Vec<i64> = triggers.iter().map(|t| t.alert_id).collect();
        assert_eq!(ids, vec![2, 1, 3]);
    }
}
