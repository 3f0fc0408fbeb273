//! Yahoo Finance client (public endpoints, no authentication)
//!
//! Daily bars and symbol metadata come from
//! `GET /v8/finance/chart/{symbol}?range=..&interval=1d`. Fundamentals
//! (valuation, margins, company profile) come from
//! `GET /v10/finance/quoteSummary/{symbol}?modules=..` and are best-effort.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate};
use reqwest::{Client, StatusCode, Url};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::provider::{HistoryProvider, SymbolProfile};
use crate::types::{HistorySeries, Lookback, PricePoint};

const DEFAULT_BASE_URL: &str = "https://query1.finance.yahoo.com";
const USER_AGENT: &str = "Mozilla/5.0 (compatible; stockcast)";
const REQUEST_TIMEOUT_SECS: u64 = 30;
const SUMMARY_MODULES: &str = "summaryDetail,defaultKeyStatistics,financialData,assetProfile";

/// Yahoo chart API client
#[derive(Clone)]
pub struct YahooClient {
    client: Client,
    base_url: String,
}

// ---------------------------------------------------------------------------
// Deserialization structs
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartEnvelope,
}

#[derive(Debug, Deserialize)]
struct ChartEnvelope {
    result: Option<Vec<ChartData>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    description: String,
}

impl ChartError {
    /// Unknown or delisted symbol, as opposed to a malformed request
    fn is_not_found(&self) -> bool {
        self.code.eq_ignore_ascii_case("Not Found")
    }
}

#[derive(Debug, Deserialize)]
struct ChartData {
    meta: ChartMeta,
    #[serde(default)]
    timestamp: Vec<i64>,
    indicators: Indicators,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChartMeta {
    currency: Option<String>,
    exchange_name: Option<String>,
    instrument_type: Option<String>,
    #[serde(default)]
    gmtoffset: i64,
    long_name: Option<String>,
    short_name: Option<String>,
    fifty_two_week_high: Option<f64>,
    fifty_two_week_low: Option<f64>,
    regular_market_volume: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    #[serde(default)]
    quote: Vec<QuoteColumns>,
}

#[derive(Debug, Default, Deserialize)]
struct QuoteColumns {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<f64>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SummaryResponse {
    quote_summary: SummaryEnvelope,
}

#[derive(Debug, Deserialize)]
struct SummaryEnvelope {
    result: Option<Vec<SummaryData>>,
    error: Option<ChartError>,
}

/// Yahoo wraps numbers as `{"raw": 1.5, "fmt": "1.50"}`, or `{}` when unknown
#[derive(Debug, Default, Deserialize)]
struct RawValue {
    raw: Option<f64>,
}

fn raw(value: &Option<RawValue>) -> Option<f64> {
    value
        .as_ref()
        .and_then(|v| v.raw)
        .filter(|v| v.is_finite())
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct SummaryData {
    summary_detail: SummaryDetail,
    default_key_statistics: KeyStatistics,
    financial_data: FinancialData,
    asset_profile: AssetProfile,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct SummaryDetail {
    #[serde(rename = "trailingPE")]
    trailing_pe: Option<RawValue>,
    beta: Option<RawValue>,
    market_cap: Option<RawValue>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct KeyStatistics {
    trailing_eps: Option<RawValue>,
    profit_margins: Option<RawValue>,
    beta: Option<RawValue>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct FinancialData {
    total_revenue: Option<RawValue>,
    profit_margins: Option<RawValue>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct AssetProfile {
    sector: Option<String>,
    industry: Option<String>,
    long_business_summary: Option<String>,
    website: Option<String>,
}

impl SummaryData {
    /// Fill the fundamentals the chart metadata lacks. Fields Yahoo leaves
    /// out keep whatever `profile` already had.
    fn apply_to(self, profile: &mut SymbolProfile) {
        let detail = &self.summary_detail;
        let stats = &self.default_key_statistics;
        let financial = &self.financial_data;

        profile.pe_ratio = raw(&detail.trailing_pe).or(profile.pe_ratio);
        profile.market_cap = raw(&detail.market_cap).or(profile.market_cap);
        profile.beta = raw(&detail.beta).or(raw(&stats.beta)).or(profile.beta);
        profile.eps = raw(&stats.trailing_eps).or(profile.eps);
        profile.profit_margins = raw(&financial.profit_margins)
            .or(raw(&stats.profit_margins))
            .or(profile.profit_margins);
        profile.revenue = raw(&financial.total_revenue).or(profile.revenue);

        let company = self.asset_profile;
        let text = |v: Option<String>| v.filter(|s| !s.trim().is_empty());
        profile.sector = text(company.sector).or(profile.sector.take());
        profile.industry = text(company.industry).or(profile.industry.take());
        profile.description = text(company.long_business_summary).or(profile.description.take());
        profile.website = text(company.website).or(profile.website.take());
    }
}

impl ChartMeta {
    fn into_profile(self) -> SymbolProfile {
        SymbolProfile {
            name: self.long_name.or(self.short_name),
            currency: self.currency,
            exchange: self.exchange_name,
            instrument_type: self.instrument_type,
            high_52w: self.fifty_two_week_high,
            low_52w: self.fifty_two_week_low,
            volume: self.regular_market_volume,
            ..Default::default()
        }
    }
}

/// Exchange-local calendar date of a bar timestamp
fn bar_date(timestamp: i64, gmtoffset: i64) -> Option<NaiveDate> {
    DateTime::from_timestamp(timestamp + gmtoffset, 0).map(|dt| dt.date_naive())
}

/// Turn a chart payload into a series plus the symbol metadata.
///
/// Bars with a null close are dropped. Other null columns fall back to the
/// close (prices) or zero (volume).
///
/// A "Not Found" chart error is an unknown symbol and yields an empty series.
fn parse_chart(symbol: &str, response: ChartResponse) -> Result<(HistorySeries, SymbolProfile)> {
    if let Some(error) = response.chart.error {
        if error.is_not_found() {
            debug!(symbol, description = %error.description, "Yahoo has no chart for symbol");
            return Ok((HistorySeries::empty(symbol), SymbolProfile::default()));
        }
        anyhow::bail!("Yahoo API error: {} - {}", error.code, error.description);
    }

    let Some(data) = response.chart.result.and_then(|r| r.into_iter().next()) else {
        return Ok((HistorySeries::empty(symbol), SymbolProfile::default()));
    };

    let quote = data.indicators.quote.into_iter().next().unwrap_or_default();
    let offset = data.meta.gmtoffset;
    let at = |column: &[Option<f64>], i: usize| column.get(i).copied().flatten();

    let points: Vec<PricePoint> = data
        .timestamp
        .iter()
        .enumerate()
        .filter_map(|(i, &ts)| {
            let close = at(&quote.close, i).filter(|c| c.is_finite())?;
            Some(PricePoint {
                date: bar_date(ts, offset)?,
                open: at(&quote.open, i).unwrap_or(close),
                high: at(&quote.high, i).unwrap_or(close),
                low: at(&quote.low, i).unwrap_or(close),
                close,
                volume: at(&quote.volume, i).unwrap_or(0.0),
            })
        })
        .collect();

    Ok((HistorySeries::new(symbol, points), data.meta.into_profile()))
}

/// Decode a raw chart reply. Yahoo answers unknown symbols with HTTP 404,
/// which is "no data" rather than a transport failure.
fn decode_chart(
    symbol: &str,
    status: StatusCode,
    body: &str,
) -> Result<(HistorySeries, SymbolProfile)> {
    if status == StatusCode::NOT_FOUND {
        return match serde_json::from_str::<ChartResponse>(body) {
            Ok(response) => parse_chart(symbol, response),
            Err(_) => Ok((HistorySeries::empty(symbol), SymbolProfile::default())),
        };
    }
    if !status.is_success() {
        anyhow::bail!("Yahoo API error {}: {}", status, body);
    }

    let response: ChartResponse =
        serde_json::from_str(body).context("Failed to parse Yahoo chart response")?;
    parse_chart(symbol, response)
}

fn parse_summary(response: SummaryResponse) -> Result<Option<SummaryData>> {
    if let Some(error) = response.quote_summary.error {
        if error.is_not_found() {
            return Ok(None);
        }
        anyhow::bail!("Yahoo API error: {} - {}", error.code, error.description);
    }
    Ok(response
        .quote_summary
        .result
        .and_then(|r| r.into_iter().next()))
}

impl YahooClient {
    pub fn new() -> Result<Self> {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    pub fn with_base_url(base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(std::time::Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn endpoint(&self, segments: [&str; 4]) -> Result<Url> {
        let mut url = Url::parse(&self.base_url).context("Invalid Yahoo base URL")?;
        url.path_segments_mut()
            .map_err(|_| anyhow::anyhow!("Yahoo base URL cannot carry a path"))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn chart_url(&self, symbol: &str, range: &str) -> Result<Url> {
        let mut url = self.endpoint(["v8", "finance", "chart", symbol])?;
        url.query_pairs_mut()
            .append_pair("range", range)
            .append_pair("interval", "1d");
        Ok(url)
    }

    fn summary_url(&self, symbol: &str) -> Result<Url> {
        let mut url = self.endpoint(["v10", "finance", "quoteSummary", symbol])?;
        url.query_pairs_mut().append_pair("modules", SUMMARY_MODULES);
        Ok(url)
    }

    /// Fetch the chart payload for `symbol` over `lookback`
    pub async fn get_chart(
        &self,
        symbol: &str,
        lookback: Lookback,
    ) -> Result<(HistorySeries, SymbolProfile)> {
        let url = self.chart_url(symbol, lookback.as_range())?;
        debug!(symbol, range = %lookback, "Fetching chart from Yahoo");

        let response = self.client.get(url).send().await?;
        let status = response.status();
        let body = response
            .text()
            .await
            .context("Failed to read Yahoo chart response")?;
        let (series, profile) = decode_chart(symbol, status, &body)?;

        debug!(symbol, bars = series.len(), "Fetched chart");
        Ok((series, profile))
    }

    async fn get_summary(&self, symbol: &str) -> Result<Option<SummaryData>> {
        let url = self.summary_url(symbol)?;
        debug!(symbol, "Fetching quote summary from Yahoo");

        let response = self.client.get(url).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Yahoo API error {}: {}", status, body);
        }

        let payload: SummaryResponse = response
            .json()
            .await
            .context("Failed to parse Yahoo quote summary")?;
        parse_summary(payload)
    }
}

#[async_trait]
impl HistoryProvider for YahooClient {
    async fn fetch_history(&self, symbol: &str, lookback: Lookback) -> Result<HistorySeries> {
        Ok(self.get_chart(symbol, lookback).await?.0)
    }

    async fn fetch_profile(&self, symbol: &str) -> Result<Option<SymbolProfile>> {
        let (_, mut profile) = self.get_chart(symbol, Lookback::FiveDays).await?;
        match self.get_summary(symbol).await {
            Ok(Some(summary)) => summary.apply_to(&mut profile),
            Ok(None) => debug!(symbol, "No quote summary"),
            Err(e) => warn!(symbol, error = %e, "Quote summary unavailable, using chart metadata"),
        }
        Ok(Some(profile))
    }

    fn name(&self) -> &'static str {
        "yahoo"
    }
}
