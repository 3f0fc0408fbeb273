//! Forecast orchestration: indicators -> model fit -> blended series -> verdict
//!
//! Two models are fitted over (date-ordinal, close) pairs: an OLS trend line
//! and a bagged tree forest. Their predictions are blended with fixed weights,
//! and the gap between them on the next day drives the confidence score.

use crate::error::ForecastError;
use crate::indicators::{rsi_regime, IndicatorSet, LONG_SMA_PERIOD};
use crate::models::{FitError, ForestConfig, LinearTrend, RandomForest};
use crate::provider::HistoryProvider;
use crate::types::{
    date_ordinal, round2, Forecast, ForecastPoint, HistorySeries, Lookback, LongTermForecast,
    Trend,
};
use crate::verdict::classify;
use chrono::Days;
use std::time::Instant;
use tracing::{debug, info};

pub const SHORT_TERM_LINEAR_WEIGHT: f64 = 0.4;
pub const SHORT_TERM_FOREST_WEIGHT: f64 = 0.6;
pub const LONG_TERM_LINEAR_WEIGHT: f64 = 0.5;
pub const LONG_TERM_FOREST_WEIGHT: f64 = 0.5;

/// Percentage points of confidence lost per unit of relative model disagreement
pub const CONFIDENCE_SENSITIVITY: f64 = 400.0;
pub const MIN_CONFIDENCE: f64 = 10.0;
pub const MAX_CONFIDENCE: f64 = 98.0;

pub const SHORT_TERM_DAYS: u64 = 30;
pub const ONE_MONTH_DAYS: i64 = 30;
pub const SIX_MONTHS_DAYS: i64 = 180;
pub const ONE_YEAR_DAYS: i64 = 365;

pub const TRAINING_LOOKBACK: Lookback = Lookback::TwoYears;
pub const MIN_TRAINING_ROWS: usize = 2;

// ============================================================================
// Blending and confidence
// ============================================================================

pub fn blend_short_term(linear: f64, forest: f64) -> f64 {
    SHORT_TERM_LINEAR_WEIGHT * linear + SHORT_TERM_FOREST_WEIGHT * forest
}

pub fn blend_long_term(linear: f64, forest: f64) -> f64 {
    LONG_TERM_LINEAR_WEIGHT * linear + LONG_TERM_FOREST_WEIGHT * forest
}

/// `100 - |a - b| / price * 400`, clamped to [10, 98].
///
/// A non-positive or non-finite price yields the floor.
pub fn confidence(linear_next: f64, forest_next: f64, current_price: f64) -> f64 {
    if !(current_price.is_finite() && current_price > 0.0) {
        return MIN_CONFIDENCE;
    }
    let disagreement = (linear_next - forest_next).abs() / current_price;
    let score = 100.0 - disagreement * CONFIDENCE_SENSITIVITY;
    if score.is_nan() {
        return MIN_CONFIDENCE;
    }
    score.clamp(MIN_CONFIDENCE, MAX_CONFIDENCE)
}

// ============================================================================
// Model ensemble
// ============================================================================

/// Linear trend + forest, fitted over the same samples
#[derive(Debug, Clone)]
pub struct ModelEnsemble {
    linear: LinearTrend,
    forest: RandomForest,
}

impl ModelEnsemble {
    pub fn fit(samples: &[(i64, f64)], config: ForestConfig) -> Result<Self, FitError> {
        let xs: Vec<f64> = samples.iter().map(|s| s.0 as f64).collect();
        let ys: Vec<f64> = samples.iter().map(|s| s.1).collect();

        let linear = LinearTrend::fit(&xs, &ys)?;
        let forest = RandomForest::fit(&xs, &ys, config)?;
        Ok(Self { linear, forest })
    }

    /// (linear, forest) predictions at `ordinal`
    pub fn predict(&self, ordinal: i64) -> (f64, f64) {
        let x = ordinal as f64;
        (self.linear.predict(x), self.forest.predict(x))
    }

    pub fn short_term(&self, ordinal: i64) -> f64 {
        let (a, b) = self.predict(ordinal);
        blend_short_term(a, b)
    }

    pub fn long_term(&self, ordinal: i64) -> f64 {
        let (a, b) = self.predict(ordinal);
        blend_long_term(a, b)
    }
}

/// (ordinal, close) for every bar where all rolling indicators are warm
pub fn training_samples(series: &HistorySeries, indicators: &IndicatorSet) -> Vec<(i64, f64)> {
    series
        .points()
        .iter()
        .enumerate()
        .filter(|(i, _)| indicators.is_warm(*i))
        .map(|(_, p)| (p.ordinal(), p.close))
        .collect()
}

// ============================================================================
// Orchestrator
// ============================================================================

/// Run the full pipeline over an already-fetched series
pub fn forecast_from_history(series: &HistorySeries) -> Result<Forecast, ForecastError> {
    let symbol = series.symbol().to_string();
    let Some(last) = series.last().copied() else {
        return Err(ForecastError::NoData { symbol });
    };

    let indicators = IndicatorSet::compute(series);
    let samples = training_samples(series, &indicators);
    if samples.len() < MIN_TRAINING_ROWS {
        return Err(ForecastError::InsufficientHistory {
            symbol,
            rows: series.len(),
            required: LONG_SMA_PERIOD + MIN_TRAINING_ROWS - 1,
        });
    }

    let ensemble = ModelEnsemble::fit(&samples, ForestConfig::default()).map_err(|e| match e {
        FitError::TooFewSamples { .. } | FitError::Degenerate => {
            ForecastError::InsufficientHistory {
                symbol: symbol.clone(),
                rows: series.len(),
                required: LONG_SMA_PERIOD + MIN_TRAINING_ROWS - 1,
            }
        }
        other => ForecastError::Internal(other.to_string()),
    })?;

    let current_price = last.close;
    let last_ordinal = date_ordinal(last.date);

    let (linear_next, forest_next) = ensemble.predict(last_ordinal + 1);
    let next_close = blend_short_term(linear_next, forest_next);

    let forecast_series: Vec<ForecastPoint> = (1..=SHORT_TERM_DAYS)
        .filter_map(|day| {
            let date = last.date.checked_add_days(Days::new(day))?;
            Some(ForecastPoint {
                date,
                value: round2(ensemble.short_term(last_ordinal + day as i64)),
            })
        })
        .collect();

    let long_term = LongTermForecast {
        one_month: round2(ensemble.long_term(last_ordinal + ONE_MONTH_DAYS)),
        six_months: round2(ensemble.long_term(last_ordinal + SIX_MONTHS_DAYS)),
        one_year: round2(ensemble.long_term(last_ordinal + ONE_YEAR_DAYS)),
    };

    let confidence = confidence(linear_next, forest_next, current_price);
    let trend = if next_close > current_price {
        Trend::Bullish
    } else {
        Trend::Bearish
    };
    let rsi = indicators.rsi_or_neutral();
    let (verdict, reason) = classify(trend, rsi, confidence);

    debug!(
        symbol = %symbol,
        rows = samples.len(),
        linear_next,
        forest_next,
        "Models fitted"
    );

    Ok(Forecast {
        symbol,
        current_price: round2(current_price),
        next_close: round2(next_close),
        trend,
        rsi: round2(rsi),
        rsi_signal: rsi_regime(rsi),
        sma: round2(indicators.latest_sma_50().unwrap_or(0.0)),
        verdict,
        reason,
        confidence: confidence as u8,
        series: forecast_series,
        long_term,
    })
}

/// Fetch two years of history and forecast it.
///
/// Model fitting is CPU-bound and runs on the blocking pool.
pub async fn run_forecast(
    provider: &dyn HistoryProvider,
    symbol: &str,
) -> Result<Forecast, ForecastError> {
    let started = Instant::now();
    let series = provider
        .fetch_history(symbol, TRAINING_LOOKBACK)
        .await
        .map_err(|source| ForecastError::Fetch {
            symbol: symbol.to_string(),
            source,
        })?;

    if series.is_empty() {
        return Err(ForecastError::NoData {
            symbol: symbol.to_string(),
        });
    }

    let forecast = tokio::task::spawn_blocking(move || forecast_from_history(&series))
        .await
        .map_err(|e| ForecastError::Internal(format!("forecast task failed: {e}")))??;

    info!(
        symbol,
        verdict = %forecast.verdict,
        confidence = forecast.confidence,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Forecast complete"
    );
    Ok(forecast)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::NEUTRAL_RSI;
    use crate::types::{PricePoint, RsiRegime, Verdict};
    use async_trait::async_trait;
    use chrono::{Duration, NaiveDate};

    fn series_from(closes: &[f64]) -> HistorySeries {
        let start = NaiveDate::from_ymd_opt(2023, 3, 1).unwrap();
        let points = closes
            .iter()
            .enumerate()
            .map(|(i, &c)| PricePoint {
                date: start + Duration::days(i as i64),
                open: c,
                high: c,
                low: c,
                close: c,
                volume: 1_000_000.0,
            })
            .collect();
        HistorySeries::new("TEST", points)
    }

    struct StubProvider {
        closes: Option<Vec<f64>>,
    }

    #[async_trait]
    impl HistoryProvider for StubProvider {
        async fn fetch_history(
            &self,
            symbol: &str,
            lookback: Lookback,
        ) -> anyhow::Result<HistorySeries> {
            assert_eq!(lookback, TRAINING_LOOKBACK);
            match &self.closes {
                Some(closes) => {
                    let series = series_from(closes);
                    Ok(HistorySeries::new(symbol, series.points().to_vec()))
                }
                None => anyhow::bail!("feed down"),
            }
        }

        fn name(&self) -> &'static str {
            "stub"
        }
    }

    #[test]
    fn test_short_term_blend_is_exact() {
        let closes: Vec<f64> = (0..120)
            .map(|i| 100.0 + i as f64 * 0.2 + (i as f64 * 0.7).sin() * 3.0)
            .collect();
        let series = series_from(&closes);
        let indicators = IndicatorSet::compute(&series);
        let samples = training_samples(&series, &indicators);
        let ensemble = ModelEnsemble::fit(&samples, ForestConfig::default()).unwrap();

        let ordinal = samples.last().unwrap().0 + 1;
        let (a, b) = ensemble.predict(ordinal);
        assert_eq!(ensemble.short_term(ordinal), 0.4 * a + 0.6 * b);
        assert_eq!(ensemble.long_term(ordinal), 0.5 * a + 0.5 * b);
    }

    #[test]
    fn test_training_rows_start_at_warm_index() {
        let closes: Vec<f64> = (0..60).map(|i| 50.0 + i as f64).collect();
        let series = series_from(&closes);
        let samples = training_samples(&series, &IndicatorSet::compute(&series));
        assert_eq!(samples.len(), 11);
        assert_eq!(samples[0].1, 99.0);
    }

    #[test]
    fn test_confidence_bounds_and_monotonicity() {
        let price = 100.0;
        let mut previous = f64::INFINITY;
        for step in 0..200 {
            let gap = step as f64 * 0.1;
            let c = confidence(price, price + gap, price);
            assert!((MIN_CONFIDENCE..=MAX_CONFIDENCE).contains(&c));
            assert!(c <= previous);
            previous = c;
        }
        assert_eq!(confidence(100.0, 100.0, 100.0), MAX_CONFIDENCE);
        // 1% gap costs 4 points
        assert!((confidence(100.0, 101.0, 100.0) - 96.0).abs() < 1e-9);
        assert_eq!(confidence(100.0, 200.0, 100.0), MIN_CONFIDENCE);
    }

    #[test]
    fn test_confidence_degenerate_price() {
        assert_eq!(confidence(1.0, 2.0, 0.0), MIN_CONFIDENCE);
        assert_eq!(confidence(1.0, 2.0, -5.0), MIN_CONFIDENCE);
        assert_eq!(confidence(1.0, 2.0, f64::NAN), MIN_CONFIDENCE);
    }

    #[test]
    fn test_linear_series_is_bullish_buy() {
        let closes: Vec<f64> = (0..150).map(|i| 100.0 + 0.5 * i as f64).collect();
        let forecast = forecast_from_history(&series_from(&closes)).unwrap();

        assert_eq!(forecast.trend, Trend::Bullish);
        assert!(matches!(forecast.verdict, Verdict::StrongBuy | Verdict::Buy));
        assert_eq!(forecast.current_price, 174.5);
        assert!(forecast.next_close > 174.5);
        assert_eq!(forecast.series.len(), 30);
        assert_eq!(
            forecast.series[0].date,
            NaiveDate::from_ymd_opt(2023, 3, 1).unwrap() + Duration::days(150)
        );
        assert!(forecast.long_term.one_year > forecast.long_term.one_month);
        // No losses in the window: RSI falls back to neutral
        assert_eq!(forecast.rsi, NEUTRAL_RSI);
        assert_eq!(forecast.rsi_signal, RsiRegime::Neutral);
    }

    #[test]
    fn test_compounding_growth_scenario() {
        let closes: Vec<f64> = (0..100).map(|i| 100.0 * 1.003f64.powi(i)).collect();
        let forecast = forecast_from_history(&series_from(&closes)).unwrap();

        assert_eq!(forecast.trend, Trend::Bullish);
        assert!(forecast.confidence > 80, "confidence {}", forecast.confidence);
        assert!(matches!(forecast.verdict, Verdict::StrongBuy | Verdict::Buy));
        assert!(forecast.sma > 0.0);
    }

    #[test]
    fn test_sharp_reversal_keeps_long_term_in_price_band() {
        // 200 days rising 100 -> 160, then 20 days falling 4% a day
        let mut closes: Vec<f64> = (0..200).map(|i| 100.0 + 60.0 * i as f64 / 199.0).collect();
        for _ in 0..20 {
            let next = closes[closes.len() - 1] * 0.96;
            closes.push(next);
        }
        let series = series_from(&closes);
        let samples = training_samples(&series, &IndicatorSet::compute(&series));
        let (lo, hi) = samples
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), s| {
                (lo.min(s.1), hi.max(s.1))
            });
        let ensemble = ModelEnsemble::fit(&samples, ForestConfig::default()).unwrap();
        let last = samples[samples.len() - 1].0;
        for days in [1, ONE_MONTH_DAYS, SIX_MONTHS_DAYS, ONE_YEAR_DAYS] {
            let (_, forest) = ensemble.predict(last + days);
            assert!(forest >= lo && forest <= hi, "+{days}: {forest}");
        }

        let forecast = forecast_from_history(&series).unwrap();
        let long_term = &forecast.long_term;
        for value in [long_term.one_month, long_term.six_months, long_term.one_year] {
            assert!(value > 0.0, "{long_term:?}");
        }
        assert!(forecast.series.iter().all(|p| p.value > 0.0));
    }

    #[test]
    fn test_flat_series_is_bearish_hold() {
        let forecast = forecast_from_history(&series_from(&[100.0; 80])).unwrap();
        assert_eq!(forecast.trend, Trend::Bearish);
        assert_eq!(forecast.verdict, Verdict::Hold);
        assert_eq!(forecast.confidence, 98);
        assert_eq!(forecast.sma, 100.0);
    }

    #[test]
    fn test_empty_history_is_no_data() {
        let err = forecast_from_history(&HistorySeries::empty("NOPE")).unwrap_err();
        assert!(matches!(err, ForecastError::NoData { ref symbol } if symbol == "NOPE"));
    }

    #[test]
    fn test_short_history_is_insufficient() {
        for n in [1usize, 30, 50] {
            let closes: Vec<f64> = (0..n).map(|i| 10.0 + i as f64).collect();
            let err = forecast_from_history(&series_from(&closes)).unwrap_err();
            assert!(
                matches!(err, ForecastError::InsufficientHistory { rows, .. } if rows == n),
                "n = {n}: {err}"
            );
        }
    }

    #[tokio::test]
    async fn test_run_forecast_through_provider() {
        let provider = StubProvider {
            closes: Some((0..120).map(|i| 20.0 + 0.1 * i as f64).collect()),
        };
        let forecast = run_forecast(&provider, "MSFT").await.unwrap();
        assert_eq!(forecast.symbol, "MSFT");
        assert_eq!(forecast.trend, Trend::Bullish);
    }

    #[tokio::test]
    async fn test_run_forecast_errors() {
        let failing = StubProvider { closes: None };
        assert!(matches!(
            run_forecast(&failing, "MSFT").await,
            Err(ForecastError::Fetch { .. })
        ));

        let empty = StubProvider {
            closes: Some(Vec::new()),
        };
        assert!(matches!(
            run_forecast(&empty, "MSFT").await,
            Err(ForecastError::NoData { .. })
        ));
    }
}
