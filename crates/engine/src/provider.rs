//! Price history provider abstraction and retry wrapper

use crate::types::{HistorySeries, Lookback};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

/// Descriptive metadata for a symbol. Every field is optional: feeds differ
/// in what they expose.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SymbolProfile {
    pub name: Option<String>,
    pub currency: Option<String>,
    pub exchange: Option<String>,
    pub instrument_type: Option<String>,
    pub high_52w: Option<f64>,
    pub low_52w: Option<f64>,
    pub volume: Option<f64>,
    pub market_cap: Option<f64>,
    pub pe_ratio: Option<f64>,
    pub eps: Option<f64>,
    pub revenue: Option<f64>,
    pub profit_margins: Option<f64>,
    pub beta: Option<f64>,
    pub sector: Option<String>,
    pub industry: Option<String>,
    pub description: Option<String>,
    pub website: Option<String>,
}

/// Source of daily price history.
///
/// An `Ok` empty series means "no data for that window" and is distinct from
/// a transport failure.
#[async_trait]
pub trait HistoryProvider: Send + Sync {
    async fn fetch_history(&self, symbol: &str, lookback: Lookback)
        -> anyhow::Result<HistorySeries>;

    async fn fetch_profile(&self, _symbol: &str) -> anyhow::Result<Option<SymbolProfile>> {
        Ok(None)
    }

    fn name(&self) -> &'static str;
}

// ============================================================================
// Retry policy
// ============================================================================

/// Exponential backoff between attempts
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_secs(1),
            multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Default::default()
        }
    }

    /// Delay before attempt `attempt + 1`, where `attempt` counts from 1
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = self.multiplier.max(1.0).powi(attempt.saturating_sub(1) as i32);
        self.initial_backoff.mul_f64(factor)
    }
}

/// Wraps a provider and retries failed or empty fetches.
///
/// Once attempts are exhausted the last outcome is returned as-is: an empty
/// series stays `Ok` so the caller can report "no data", and an error stays
/// an error.
pub struct RetryingProvider<P> {
    inner: P,
    policy: RetryPolicy,
}

impl<P: HistoryProvider> RetryingProvider<P> {
    pub fn new(inner: P, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }
}

#[async_trait]
impl<P: HistoryProvider> HistoryProvider for RetryingProvider<P> {
    async fn fetch_history(
        &self,
        symbol: &str,
        lookback: Lookback,
    ) -> anyhow::Result<HistorySeries> {
        let attempts = self.policy.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            let outcome = self.inner.fetch_history(symbol, lookback).await;
            let retryable = match &outcome {
                Ok(series) => {
                    if series.is_empty() {
                        debug!(symbol, attempt, "Provider returned empty history");
                    }
                    series.is_empty()
                }
                Err(e) => {
                    warn!(
                        provider = self.inner.name(),
                        symbol,
                        attempt,
                        error = %e,
                        "History fetch failed"
                    );
                    true
                }
            };

            if !retryable || attempt >= attempts {
                return outcome;
            }

            tokio::time::sleep(self.policy.delay_for(attempt)).await;
            attempt += 1;
        }
    }

    async fn fetch_profile(&self, symbol: &str) -> anyhow::Result<Option<SymbolProfile>> {
        self.inner.fetch_profile(symbol).await
    }

    fn name(&self) -> &'static str {
        self.inner.name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PricePoint;
    use chrono::NaiveDate;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Fails (or returns empty) for the first `bad_calls` calls
    struct FlakyProvider {
        calls: AtomicU32,
        bad_calls: u32,
        fail_with_error: bool,
    }

    #[async_trait]
    impl HistoryProvider for FlakyProvider {
        async fn fetch_history(
            &self,
            symbol: &str,
            _lookback: Lookback,
        ) -> anyhow::Result<HistorySeries> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if n <= self.bad_calls {
                if self.fail_with_error {
                    anyhow::bail!("upstream unavailable");
                }
                return Ok(HistorySeries::empty(symbol));
            }
            let point = PricePoint {
                date: NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
                open: 10.0,
                high: 10.0,
                low: 10.0,
                close: 10.0,
                volume: 0.0,
            };
            Ok(HistorySeries::new(symbol, vec![point]))
        }

        fn name(&self) -> &'static str {
            "flaky"
        }
    }

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            initial_backoff: Duration::ZERO,
            multiplier: 2.0,
        }
    }

    fn flaky(bad_calls: u32, fail_with_error: bool) -> FlakyProvider {
        FlakyProvider {
            calls: AtomicU32::new(0),
            bad_calls,
            fail_with_error,
        }
    }

    #[test]
    fn test_backoff_grows_geometrically() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(1), Duration::from_secs(1));
        assert_eq!(policy.delay_for(2), Duration::from_secs(2));
        assert_eq!(policy.delay_for(3), Duration::from_secs(4));
    }

    #[tokio::test]
    async fn test_recovers_after_errors() {
        let provider = RetryingProvider::new(flaky(2, true), fast_policy(3));
        let series = provider.fetch_history("AAPL", Lookback::OneDay).await.unwrap();
        assert_eq!(series.len(), 1);
        assert_eq!(provider.inner.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retries_empty_then_gives_up_with_empty() {
        let provider = RetryingProvider::new(flaky(10, false), fast_policy(3));
        let series = provider.fetch_history("AAPL", Lookback::OneDay).await.unwrap();
        assert!(series.is_empty());
        assert_eq!(provider.inner.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_exhausted_errors_propagate() {
        let provider = RetryingProvider::new(flaky(10, true), fast_policy(2));
        let result = provider.fetch_history("AAPL", Lookback::OneDay).await;
        assert!(result.is_err());
        assert_eq!(provider.inner.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_zero_attempts_still_calls_once() {
        let provider = RetryingProvider::new(flaky(0, false), fast_policy(0));
        assert!(provider.fetch_history("AAPL", Lookback::OneDay).await.is_ok());
        assert_eq!(provider.inner.calls.load(Ordering::SeqCst), 1);
    }
}
