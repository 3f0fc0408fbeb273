//! Forecast pipeline errors

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ForecastError {
    #[error("no price history available for {symbol}")]
    NoData { symbol: String },

    #[error("not enough history to fit {symbol}: {rows} usable rows, need {required}")]
    InsufficientHistory {
        symbol: String,
        rows: usize,
        required: usize,
    },

    #[error("failed to fetch history for {symbol}: {source}")]
    Fetch {
        symbol: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("internal forecast error: {0}")]
    Internal(String),
}

impl ForecastError {
    /// True for the conditions reported to clients as "not found"
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            ForecastError::NoData { .. } | ForecastError::InsufficientHistory { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_classification() {
        assert!(ForecastError::NoData {
            symbol: "X".into()
        }
        .is_not_found());
        assert!(ForecastError::InsufficientHistory {
            symbol: "X".into(),
            rows: 1,
            required: 2
        }
        .is_not_found());
        assert!(!ForecastError::Fetch {
            symbol: "X".into(),
            source: anyhow::anyhow!("timeout"),
        }
        .is_not_found());
    }

    #[test]
    fn test_fetch_message_includes_cause() {
        let err = ForecastError::Fetch {
            symbol: "AAPL".into(),
            source: anyhow::anyhow!("connection reset"),
        };
        assert_eq!(
            err.to_string(),
            "failed to fetch history for AAPL: connection reset"
        );
    }
}
