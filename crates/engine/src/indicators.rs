//! Technical indicators over a daily close series
//!
//! RSI is evaluated at the most recent bar only; moving averages are returned
//! aligned to the input, with `None` for bars still inside the warm-up window.

use crate::types::{HistorySeries, RsiRegime};
use ta::indicators::SimpleMovingAverage;
use ta::Next;

pub const RSI_PERIOD: usize = 14;
pub const SHORT_SMA_PERIOD: usize = 20;
pub const LONG_SMA_PERIOD: usize = 50;

/// Substituted whenever RSI is undefined (short series or zero average loss)
pub const NEUTRAL_RSI: f64 = 50.0;

pub const RSI_OVERSOLD: f64 = 30.0;
pub const RSI_OVERBOUGHT: f64 = 70.0;

// ============================================================================
// RSI
// ============================================================================

/// Relative Strength Index at the last bar.
///
/// Gains and losses are averaged independently over the trailing `window`
/// close-to-close deltas. Returns `None` when fewer than `window + 1` closes
/// are available or when the average loss is zero.
pub fn compute_rsi(closes: &[f64], window: usize) -> Option<f64> {
    if window == 0 || closes.len() < window + 1 {
        return None;
    }

    let tail = &closes[closes.len() - (window + 1)..];
    let (gains, losses) = tail
        .windows(2)
        .map(|w| w[1] - w[0])
        .fold((0.0, 0.0), |(g, l), delta| {
            (g + delta.max(0.0), l + (-delta).max(0.0))
        });

    let avg_gain = gains / window as f64;
    let avg_loss = losses / window as f64;
    if avg_loss == 0.0 {
        return None;
    }

    let rs = avg_gain / avg_loss;
    Some(100.0 - 100.0 / (1.0 + rs))
}

/// RSI-14 with the neutral fallback applied
pub fn rsi_or_neutral(closes: &[f64]) -> f64 {
    compute_rsi(closes, RSI_PERIOD).unwrap_or(NEUTRAL_RSI)
}

pub fn rsi_regime(rsi: f64) -> RsiRegime {
    if rsi < RSI_OVERSOLD {
        RsiRegime::Oversold
    } else if rsi > RSI_OVERBOUGHT {
        RsiRegime::Overbought
    } else {
        RsiRegime::Neutral
    }
}

// ============================================================================
// Simple moving average
// ============================================================================

/// Rolling mean of `window` closes; the first `window - 1` entries are `None`
pub fn compute_sma(closes: &[f64], window: usize) -> Vec<Option<f64>> {
    let Ok(mut sma) = SimpleMovingAverage::new(window) else {
        return vec![None; closes.len()];
    };

    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| {
            let value = sma.next(close);
            (i + 1 >= window).then_some(value)
        })
        .collect()
}

// ============================================================================
// Indicator set
// ============================================================================

/// All indicators derived from one history series
#[derive(Debug, Clone)]
pub struct IndicatorSet {
    pub rsi: Option<f64>,
    pub sma_20: Vec<Option<f64>>,
    pub sma_50: Vec<Option<f64>>,
}

impl IndicatorSet {
    pub fn compute(series: &HistorySeries) -> Self {
        let closes = series.closes();
        Self {
            rsi: compute_rsi(&closes, RSI_PERIOD),
            sma_20: compute_sma(&closes, SHORT_SMA_PERIOD),
            sma_50: compute_sma(&closes, LONG_SMA_PERIOD),
        }
    }

    /// True when every rolling indicator has a value at bar `i`
    pub fn is_warm(&self, i: usize) -> bool {
        matches!(
            (self.sma_20.get(i), self.sma_50.get(i)),
            (Some(Some(_)), Some(Some(_)))
        )
    }

    /// First bar with every rolling indicator available
    pub fn warm_index(&self) -> Option<usize> {
        (0..self.sma_50.len()).find(|&i| self.is_warm(i))
    }

    pub fn latest_sma_50(&self) -> Option<f64> {
        self.sma_50.last().copied().flatten()
    }

    pub fn rsi_or_neutral(&self) -> f64 {
        self.rsi.unwrap_or(NEUTRAL_RSI)
    }
}
