//! Quotes, chart history and two-symbol comparison

use crate::fallback;
use crate::indicators::{compute_sma, LONG_SMA_PERIOD, SHORT_SMA_PERIOD};
use crate::provider::{HistoryProvider, SymbolProfile};
use crate::types::{round2, HistorySeries, Lookback};
use chrono::NaiveDate;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};

pub const QUOTE_LOOKBACK: Lookback = Lookback::FiveDays;
pub const COMPARE_LOOKBACK: Lookback = Lookback::SixMonths;

const MAX_SYMBOL_LEN: usize = 20;
const NO_DESCRIPTION: &str = "No description available.";

#[derive(Error, Debug)]
pub enum QuoteError {
    #[error("invalid symbol: {0:?}")]
    InvalidSymbol(String),

    #[error("stock not found: {symbol}")]
    NotFound { symbol: String },

    #[error("unable to fetch data for {symbol}: {source}")]
    Fetch {
        symbol: String,
        #[source]
        source: anyhow::Error,
    },
}

/// Trim and upper-case a ticker; rejects anything outside `[A-Z0-9.^=-]`
pub fn normalize_symbol(raw: &str) -> Result<String, QuoteError> {
    let symbol = raw.trim().to_ascii_uppercase();
    let valid = !symbol.is_empty()
        && symbol.len() <= MAX_SYMBOL_LEN
        && symbol
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '^' | '=' | '-'));
    if valid {
        Ok(symbol)
    } else {
        Err(QuoteError::InvalidSymbol(raw.to_string()))
    }
}

/// Hand-written blurbs for symbols the feed describes poorly
pub fn custom_description(symbol: &str) -> Option<&'static str> {
    match symbol {
        "^NSEI" => Some(
            "The NIFTY 50 is a benchmark Indian stock market index that represents the weighted \
             average of 50 of the largest Indian companies listed on the National Stock Exchange.",
        ),
        "^BSESN" => Some(
            "The S&P BSE SENSEX (S&P Bombay Stock Exchange Sensitive Index), is a free-float \
             market-weighted stock market index of 30 well-established and financially sound \
             companies listed on the Bombay Stock Exchange.",
        ),
        "BTC-USD" => Some(
            "Bitcoin is a decentralized digital currency created in 2009. It offers the promise \
             of lower transaction fees than traditional online payment mechanisms and is operated \
             by a decentralized authority, unlike government-issued currencies.",
        ),
        _ => None,
    }
}

/// Last close, absolute change and percent change vs the previous bar
fn price_change(series: &HistorySeries) -> Option<(f64, f64, f64)> {
    let current = series.last()?.close;
    let previous = series.previous_close().unwrap_or(current);
    let change = current - previous;
    let percent = if previous != 0.0 {
        change / previous * 100.0
    } else {
        0.0
    };
    Some((current, change, percent))
}

/// Profile lookups are best-effort: a failure degrades to defaults
async fn profile_or_default(provider: &dyn HistoryProvider, symbol: &str) -> SymbolProfile {
    match provider.fetch_profile(symbol).await {
        Ok(profile) => profile.unwrap_or_default(),
        Err(e) => {
            warn!(symbol, error = %e, "Profile fetch failed, using defaults");
            SymbolProfile::default()
        }
    }
}

// ============================================================================
// Quote
// ============================================================================

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Quote {
    pub symbol: String,
    pub price: f64,
    pub change: f64,
    pub change_percent: f64,
    pub volume: f64,
    pub market_cap: f64,
    pub high_52w: f64,
    pub low_52w: f64,
    pub pe_ratio: f64,
    pub name: String,
    pub sector: String,
    pub industry: String,
    pub description: String,
    pub website: String,
    /// True when served from the static table
    pub fallback: bool,
}

impl Quote {
    fn from_fallback(entry: &fallback::FallbackQuote, note: &str) -> Self {
        Self {
            symbol: entry.symbol.to_string(),
            price: entry.price,
            change: entry.change,
            change_percent: entry.change_percent,
            volume: 0.0,
            market_cap: 0.0,
            high_52w: 0.0,
            low_52w: 0.0,
            pe_ratio: 0.0,
            name: entry.name.to_string(),
            sector: fallback::sector_label(entry.symbol).to_string(),
            industry: "Market".to_string(),
            description: format!("{} - {}", entry.name, note),
            website: "#".to_string(),
            fallback: true,
        }
    }
}

/// Latest quote for `symbol`.
///
/// A failed or empty fetch falls back to the static table when the symbol is
/// listed there; otherwise it is `Fetch` or `NotFound` respectively.
pub async fn fetch_quote(provider: &dyn HistoryProvider, symbol: &str) -> Result<Quote, QuoteError> {
    let symbol = normalize_symbol(symbol)?;

    let series = match provider.fetch_history(&symbol, QUOTE_LOOKBACK).await {
        Ok(series) => series,
        Err(source) => {
            if let Some(entry) = fallback::lookup(&symbol) {
                warn!(symbol = %symbol, error = %source, "Quote fetch failed, serving fallback");
                return Ok(Quote::from_fallback(
                    entry,
                    "Using cached data due to API limitations",
                ));
            }
            return Err(QuoteError::Fetch { symbol, source });
        }
    };

    let Some((price, change, change_percent)) = price_change(&series) else {
        if let Some(entry) = fallback::lookup(&symbol) {
            debug!(symbol = %symbol, "No bars, serving fallback");
            return Ok(Quote::from_fallback(
                entry,
                "Real-time data temporarily unavailable",
            ));
        }
        return Err(QuoteError::NotFound { symbol });
    };

    let profile = profile_or_default(provider, &symbol).await;
    let description = profile
        .description
        .filter(|d| !d.is_empty() && d != NO_DESCRIPTION)
        .or_else(|| custom_description(&symbol).map(str::to_string))
        .unwrap_or_else(|| NO_DESCRIPTION.to_string());

    Ok(Quote {
        price: round2(price),
        change: round2(change),
        change_percent: round2(change_percent),
        volume: profile.volume.unwrap_or(0.0),
        market_cap: profile.market_cap.unwrap_or(0.0),
        high_52w: profile.high_52w.unwrap_or(0.0),
        low_52w: profile.low_52w.unwrap_or(0.0),
        pe_ratio: profile.pe_ratio.unwrap_or(0.0),
        name: profile.name.unwrap_or_else(|| symbol.clone()),
        sector: profile.sector.unwrap_or_else(|| "Index/Crypto".to_string()),
        industry: profile.industry.unwrap_or_else(|| "Market".to_string()),
        description,
        website: profile.website.unwrap_or_else(|| "#".to_string()),
        fallback: false,
        symbol,
    })
}

// ============================================================================
// Chart history
// ============================================================================

/// One chart bar with its moving averages (0 while warming up)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryRow {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    pub sma20: f64,
    pub sma50: f64,
}

pub fn history_rows(series: &HistorySeries) -> Vec<HistoryRow> {
    let closes = series.closes();
    let sma20 = compute_sma(&closes, SHORT_SMA_PERIOD);
    let sma50 = compute_sma(&closes, LONG_SMA_PERIOD);

    series
        .points()
        .iter()
        .zip(sma20.into_iter().zip(sma50))
        .map(|(p, (s20, s50))| HistoryRow {
            date: p.date,
            open: p.open,
            high: p.high,
            low: p.low,
            close: p.close,
            volume: p.volume,
            sma20: s20.unwrap_or(0.0),
            sma50: s50.unwrap_or(0.0),
        })
        .collect()
}

/// Chart rows for the `range` query value (1d, 1w, 1m, 6mo, 1y, 5y)
pub async fn chart_history(
    provider: &dyn HistoryProvider,
    symbol: &str,
    range: &str,
) -> Result<Vec<HistoryRow>, QuoteError> {
    let symbol = normalize_symbol(symbol)?;
    let lookback = Lookback::from_chart_range(range);
    let series = provider
        .fetch_history(&symbol, lookback)
        .await
        .map_err(|source| QuoteError::Fetch {
            symbol: symbol.clone(),
            source,
        })?;
    Ok(history_rows(&series))
}

// ============================================================================
// Comparison
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClosePoint {
    pub date: NaiveDate,
    pub price: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StockSnapshot {
    pub symbol: String,
    pub price: f64,
    pub change: f64,
    pub change_percent: f64,
    pub market_cap: f64,
    pub pe_ratio: f64,
    pub eps: f64,
    pub beta: f64,
    pub high52: f64,
    pub low52: f64,
    pub revenue: f64,
    pub sector: String,
    pub score: u8,
    pub history: Vec<ClosePoint>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Comparison {
    pub stock1: StockSnapshot,
    pub stock2: StockSnapshot,
    pub winner: String,
}

/// +1 each for a positive day, PE < 25, margins > 10% and beta < 1.2.
///
/// Missing fundamentals count against the symbol: PE as 100, margins as 0
/// and beta as 1.5.
pub fn score(change_percent: f64, profile: &SymbolProfile) -> u8 {
    let checks = [
        change_percent > 0.0,
        profile.pe_ratio.unwrap_or(100.0) < 25.0,
        profile.profit_margins.unwrap_or(0.0) > 0.1,
        profile.beta.unwrap_or(1.5) < 1.2,
    ];
    checks.iter().filter(|&&passed| passed).count() as u8
}

pub fn winner(a: &StockSnapshot, b: &StockSnapshot) -> String {
    match a.score.cmp(&b.score) {
        std::cmp::Ordering::Greater => a.symbol.clone(),
        std::cmp::Ordering::Less => b.symbol.clone(),
        std::cmp::Ordering::Equal => "Tie".to_string(),
    }
}

pub async fn snapshot(
    provider: &dyn HistoryProvider,
    symbol: &str,
) -> Result<StockSnapshot, QuoteError> {
    let symbol = normalize_symbol(symbol)?;
    let series = provider
        .fetch_history(&symbol, COMPARE_LOOKBACK)
        .await
        .map_err(|source| QuoteError::Fetch {
            symbol: symbol.clone(),
            source,
        })?;

    let Some((price, change, change_percent)) = price_change(&series) else {
        return Err(QuoteError::NotFound { symbol });
    };
    let profile = profile_or_default(provider, &symbol).await;

    Ok(StockSnapshot {
        price: round2(price),
        change: round2(change),
        change_percent: round2(change_percent),
        market_cap: profile.market_cap.unwrap_or(0.0),
        pe_ratio: profile.pe_ratio.unwrap_or(0.0),
        eps: profile.eps.unwrap_or(0.0),
        beta: profile.beta.unwrap_or(0.0),
        high52: profile.high_52w.unwrap_or(0.0),
        low52: profile.low_52w.unwrap_or(0.0),
        revenue: profile.revenue.unwrap_or(0.0),
        sector: profile.sector.clone().unwrap_or_else(|| "Unknown".to_string()),
        score: score(change_percent, &profile),
        history: series
            .points()
            .iter()
            .map(|p| ClosePoint {
                date: p.date,
                price: p.close,
            })
            .collect(),
        symbol,
    })
}

/// Snapshot both symbols concurrently and pick the higher score
pub async fn compare(
    provider: &dyn HistoryProvider,
    symbol1: &str,
    symbol2: &str,
) -> Result<Comparison, QuoteError> {
    let (stock1, stock2) = tokio::try_join!(
        snapshot(provider, symbol1),
        snapshot(provider, symbol2)
    )?;
    let winner = winner(&stock1, &stock2);
    Ok(Comparison {
        stock1,
        stock2,
        winner,
    })
}
