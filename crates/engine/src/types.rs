//! Core types for price history and forecasts

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A single daily bar (OHLCV)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl PricePoint {
    /// Date encoded as days since 0001-01-01 (day 1), the regression input axis
    pub fn ordinal(&self) -> i64 {
        date_ordinal(self.date)
    }
}

pub fn date_ordinal(date: NaiveDate) -> i64 {
    date.num_days_from_ce() as i64
}

/// Ordered daily history for one symbol.
///
/// Points are sorted by date and de-duplicated on construction (the last
/// point for a repeated date wins). An empty series is valid: it is what a
/// provider returns when it has no data for the requested window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistorySeries {
    symbol: String,
    points: Vec<PricePoint>,
}

impl HistorySeries {
    pub fn new(symbol: impl Into<String>, mut points: Vec<PricePoint>) -> Self {
        points.sort_by_key(|p| p.date);
        // dedup_by keeps the first of a run; reverse so the latest fetch wins
        points.reverse();
        points.dedup_by_key(|p| p.date);
        points.reverse();
        Self {
            symbol: symbol.into(),
            points,
        }
    }

    pub fn empty(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            points: Vec::new(),
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn points(&self) -> &[PricePoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn closes(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.close).collect()
    }

    pub fn last(&self) -> Option<&PricePoint> {
        self.points.last()
    }

    /// Close of the bar before the last one, if any
    pub fn previous_close(&self) -> Option<f64> {
        let n = self.points.len();
        (n >= 2).then(|| self.points[n - 2].close)
    }
}

/// How far back to ask the provider for history
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Lookback {
    OneDay,
    FiveDays,
    OneMonth,
    SixMonths,
    OneYear,
    TwoYears,
    FiveYears,
}

impl Lookback {
    /// Range string understood by the Yahoo chart API
    pub fn as_range(&self) -> &'static str {
        match self {
            Lookback::OneDay => "1d",
            Lookback::FiveDays => "5d",
            Lookback::OneMonth => "1mo",
            Lookback::SixMonths => "6mo",
            Lookback::OneYear => "1y",
            Lookback::TwoYears => "2y",
            Lookback::FiveYears => "5y",
        }
    }

    /// Map the chart endpoint's `range` query parameter; unknown values fall back to 6 months
    pub fn from_chart_range(range: &str) -> Self {
        match range {
            "1d" => Lookback::OneDay,
            "1w" => Lookback::FiveDays,
            "1m" => Lookback::OneMonth,
            "6mo" => Lookback::SixMonths,
            "1y" => Lookback::OneYear,
            "5y" => Lookback::FiveYears,
            _ => Lookback::SixMonths,
        }
    }
}

impl fmt::Display for Lookback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_range())
    }
}

/// Direction of the next-day blended forecast relative to the current price
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Trend {
    Bullish,
    Bearish,
}

/// Discrete trading recommendation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Verdict {
    #[serde(rename = "STRONG BUY")]
    StrongBuy,
    #[serde(rename = "BUY")]
    Buy,
    #[serde(rename = "HOLD")]
    Hold,
    #[serde(rename = "SELL")]
    Sell,
    #[serde(rename = "STRONG SELL")]
    StrongSell,
}

impl Verdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::StrongBuy => "STRONG BUY",
            Verdict::Buy => "BUY",
            Verdict::Hold => "HOLD",
            Verdict::Sell => "SELL",
            Verdict::StrongSell => "STRONG SELL",
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Informational RSI label; does not feed the verdict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RsiRegime {
    Oversold,
    Neutral,
    Overbought,
}

/// One forecast day
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastPoint {
    pub date: NaiveDate,
    pub value: f64,
}

/// Blended predictions at the named long-term horizons
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LongTermForecast {
    #[serde(rename = "1mo")]
    pub one_month: f64,
    #[serde(rename = "6mo")]
    pub six_months: f64,
    #[serde(rename = "1y")]
    pub one_year: f64,
}

/// Full forecast response for one symbol
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Forecast {
    pub symbol: String,
    pub current_price: f64,
    pub next_close: f64,
    pub trend: Trend,
    pub rsi: f64,
    pub rsi_signal: RsiRegime,
    pub sma: f64,
    pub verdict: Verdict,
    pub reason: String,
    pub confidence: u8,
    pub series: Vec<ForecastPoint>,
    pub long_term: LongTermForecast,
}

/// Round to cents, the precision of every price in API responses
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(date: &str, close: f64) -> PricePoint {
        PricePoint {
            date: NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
            open: close,
            high: close,
            low: close,
            close,
            volume: 1000.0,
        }
    }

    #[test]
    fn test_series_sorted_and_deduplicated() {
        let series = HistorySeries::new(
            "AAPL",
            vec![
                point("2024-01-03", 12.0),
                point("2024-01-01", 10.0),
                point("2024-01-02", 11.0),
                point("2024-01-03", 13.0),
            ],
        );

        assert_eq!(series.len(), 3);
        assert_eq!(series.closes(), vec![10.0, 11.0, 13.0]);
        assert_eq!(series.previous_close(), Some(11.0));
    }

    #[test]
    fn test_ordinal_matches_proleptic_day_count() {
        assert_eq!(point("0001-01-01", 1.0).ordinal(), 1);
        assert_eq!(point("2024-01-01", 1.0).ordinal(), 738_886);
    }

    #[test]
    fn test_chart_range_mapping() {
        assert_eq!(Lookback::from_chart_range("1w"), Lookback::FiveDays);
        assert_eq!(Lookback::from_chart_range("1m").as_range(), "1mo");
        assert_eq!(Lookback::from_chart_range("bogus"), Lookback::SixMonths);
    }

    #[test]
    fn test_verdict_serializes_with_spaces() {
        let json = serde_json::to_string(&Verdict::StrongBuy).unwrap();
        assert_eq!(json, "\"STRONG BUY\"");
    }

    #[test]
    fn test_round2() {
        assert_eq!(round2(134.5678), 134.57);
        assert_eq!(round2(-2.344), -2.34);
    }
}
