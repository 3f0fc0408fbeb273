//! Static last-known quotes for popular symbols
//!
//! Served by the quote path only, when the live feed fails or has no bars.

/// A canned quote
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FallbackQuote {
    pub symbol: &'static str,
    pub name: &'static str,
    pub price: f64,
    pub change: f64,
    pub change_percent: f64,
}

const FALLBACK_QUOTES: &[FallbackQuote] = &[
    FallbackQuote {
        symbol: "^NSEI",
        name: "NIFTY 50",
        price: 19850.75,
        change: 150.25,
        change_percent: 0.76,
    },
    FallbackQuote {
        symbol: "^BSESN",
        name: "SENSEX",
        price: 65800.50,
        change: 250.30,
        change_percent: 0.38,
    },
    FallbackQuote {
        symbol: "BTC-USD",
        name: "Bitcoin USD",
        price: 42500.00,
        change: 1200.00,
        change_percent: 2.91,
    },
    FallbackQuote {
        symbol: "RELIANCE.NS",
        name: "Reliance Industries Ltd.",
        price: 2850.30,
        change: 25.60,
        change_percent: 0.91,
    },
    FallbackQuote {
        symbol: "TCS.NS",
        name: "Tata Consultancy Services",
        price: 3650.75,
        change: 45.20,
        change_percent: 1.25,
    },
    FallbackQuote {
        symbol: "HDFCBANK.NS",
        name: "HDFC Bank Ltd.",
        price: 1585.40,
        change: 12.30,
        change_percent: 0.78,
    },
    FallbackQuote {
        symbol: "AAPL",
        name: "Apple Inc.",
        price: 185.50,
        change: 2.30,
        change_percent: 1.25,
    },
    FallbackQuote {
        symbol: "TSLA",
        name: "Tesla Inc.",
        price: 245.80,
        change: -3.20,
        change_percent: -1.28,
    },
    FallbackQuote {
        symbol: "NVDA",
        name: "NVIDIA Corporation",
        price: 485.60,
        change: 8.40,
        change_percent: 1.76,
    },
];

/// Case-insensitive lookup
pub fn lookup(symbol: &str) -> Option<&'static FallbackQuote> {
    FALLBACK_QUOTES
        .iter()
        .find(|q| q.symbol.eq_ignore_ascii_case(symbol.trim()))
}

/// Indices (`^`-prefixed) and crypto pairs (`-`) vs plain equities
pub fn sector_label(symbol: &str) -> &'static str {
    if symbol.starts_with('^') || symbol.contains('-') {
        "Index/Crypto"
    } else {
        "Technology"
    }
}

pub fn symbols() -> impl Iterator<Item = &'static str> {
    FALLBACK_QUOTES.iter().map(|q| q.symbol)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_ignores_case() {
        let quote = lookup("reliance.ns").unwrap();
        assert_eq!(quote.name, "Reliance Industries Ltd.");
        assert_eq!(quote.price, 2850.30);
        assert!(lookup("MSFT").is_none());
    }

    #[test]
    fn test_table_covers_expected_symbols() {
        let all: Vec<_> = symbols().collect();
        assert_eq!(all.len(), 9);
        assert!(all.contains(&"^BSESN"));
        assert!(all.contains(&"NVDA"));
    }

    #[test]
    fn test_sector_label() {
        assert_eq!(sector_label("^NSEI"), "Index/Crypto");
        assert_eq!(sector_label("BTC-USD"), "Index/Crypto");
        assert_eq!(sector_label("AAPL"), "Technology");
    }
}
