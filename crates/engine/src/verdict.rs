//! Trend + RSI -> trading verdict

use crate::types::{Trend, Verdict};

/// Bullish with RSI below this is a strong buy
pub const CHEAP_RSI: f64 = 45.0;
/// Bearish with RSI above this is at least a sell
pub const SELL_RSI: f64 = 55.0;
pub const EXPENSIVE_RSI: f64 = 70.0;

/// Map the forecast direction and current RSI to a verdict and its reason.
///
/// Rows are checked in order and the first match wins. `rsi` must already
/// have the neutral fallback applied. `confidence` only appears in the BUY
/// reason.
pub fn classify(trend: Trend, rsi: f64, confidence: f64) -> (Verdict, String) {
    match trend {
        Trend::Bullish => {
            if rsi < CHEAP_RSI {
                (
                    Verdict::StrongBuy,
                    "Price expected to rise & stock is cheap (RSI low).".to_string(),
                )
            } else if rsi < EXPENSIVE_RSI {
                (
                    Verdict::Buy,
                    format!("AI predicts uptrend (Confidence: {}%).", confidence as i64),
                )
            } else {
                (
                    Verdict::Hold,
                    "Price rising, but stock is expensive (Overbought).".to_string(),
                )
            }
        }
        Trend::Bearish => {
            if rsi > EXPENSIVE_RSI {
                (
                    Verdict::StrongSell,
                    "Price dropping & stock is too expensive.".to_string(),
                )
            } else if rsi > SELL_RSI {
                (Verdict::Sell, "AI predicts downtrend.".to_string())
            } else {
                (
                    Verdict::Hold,
                    "Price dropping, but selling now might be late.".to_string(),
                )
            }
        }
    }
}
