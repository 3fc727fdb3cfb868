//! Quote Types
//!
//! Point-in-time price snapshots keyed by ticker symbol, the keyed set the
//! coordinator owns, and the streaming connection status.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Normalize a ticker symbol for comparison and transmission.
///
/// Trims surrounding whitespace and uppercases. Returns `None` for blank input.
#[must_use]
pub fn normalize_symbol(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_uppercase())
    }
}

/// Normalize a list of symbols, dropping blanks and duplicates.
///
/// First occurrence wins, so the caller's ordering is preserved.
#[must_use]
pub fn normalize_symbols<S: AsRef<str>>(raw: &[S]) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(raw.len());
    for symbol in raw.iter().filter_map(|s| normalize_symbol(s.as_ref())) {
        if !out.contains(&symbol) {
            out.push(symbol);
        }
    }
    out
}

/// Market snapshot for a single symbol.
///
/// Quotes are replaced wholesale on every update, never patched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quote {
    /// Uppercase ticker symbol.
    pub symbol: String,
    /// Best bid price.
    pub bid: Decimal,
    /// Best ask price.
    pub ask: Decimal,
    /// Last trade price.
    pub last: Decimal,
    /// Day change in price.
    pub change: Decimal,
    /// Day change in percent.
    pub change_percent: Decimal,
    /// When this snapshot was taken.
    pub updated_at: DateTime<Utc>,
    /// Whether trading in the symbol is halted.
    pub trading_halted: bool,
}

impl Quote {
    /// Create a quote with zero prices for `symbol`, stamped now.
    #[must_use]
    pub fn empty(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            bid: Decimal::ZERO,
            ask: Decimal::ZERO,
            last: Decimal::ZERO,
            change: Decimal::ZERO,
            change_percent: Decimal::ZERO,
            updated_at: Utc::now(),
            trading_halted: false,
        }
    }

    /// Midpoint between bid and ask.
    #[must_use]
    pub fn mid(&self) -> Decimal {
        (self.bid + self.ask) / Decimal::TWO
    }

    /// Ask minus bid.
    #[must_use]
    pub fn spread(&self) -> Decimal {
        self.ask - self.bid
    }

    /// Prior session close, derived from last price and day change.
    #[must_use]
    pub fn previous_close(&self) -> Decimal {
        self.last - self.change
    }
}

/// Quotes keyed by normalized symbol.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct QuoteSet {
    quotes: BTreeMap<String, Quote>,
}

impl QuoteSet {
    /// Create an empty set.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            quotes: BTreeMap::new(),
        }
    }

    /// Look up a quote by symbol, ignoring case.
    #[must_use]
    pub fn get(&self, symbol: &str) -> Option<&Quote> {
        normalize_symbol(symbol).and_then(|key| self.quotes.get(&key))
    }

    /// Insert or replace the quote for its symbol.
    ///
    /// Returns `false` if the quote carries a blank symbol.
    pub fn upsert(&mut self, mut quote: Quote) -> bool {
        let Some(key) = normalize_symbol(&quote.symbol) else {
            return false;
        };
        quote.symbol.clone_from(&key);
        self.quotes.insert(key, quote);
        true
    }

    /// Replace the entire contents with `quotes`.
    pub fn replace_all(&mut self, quotes: impl IntoIterator<Item = Quote>) {
        self.quotes.clear();
        for quote in quotes {
            self.upsert(quote);
        }
    }

    /// Remove every quote.
    pub fn clear(&mut self) {
        self.quotes.clear();
    }

    /// Number of quotes held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.quotes.len()
    }

    /// Whether the set is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.quotes.is_empty()
    }

    /// Symbols in sorted order.
    pub fn symbols(&self) -> impl Iterator<Item = &str> {
        self.quotes.keys().map(String::as_str)
    }

    /// Quotes in symbol order.
    pub fn iter(&self) -> impl Iterator<Item = &Quote> {
        self.quotes.values()
    }
}

/// Streaming connection status as seen by consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    /// No live streaming connection.
    #[default]
    Disconnected,
    /// Opening or re-opening a connection.
    Connecting,
    /// Connected and authenticated.
    Connected,
}

impl ConnectionStatus {
    /// Status name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
        }
    }
}

impl std::fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn quote(symbol: &str, last: &str) -> Quote {
        Quote {
            last: dec(last),
            ..Quote::empty(symbol)
        }
    }

    #[test]
    fn normalize_trims_and_uppercases() {
        assert_eq!(normalize_symbol("  aapl "), Some("AAPL".to_string()));
        assert_eq!(normalize_symbol("   "), None);
        assert_eq!(normalize_symbol(""), None);
    }

    #[test]
    fn normalize_symbols_dedups_in_order() {
        let out = normalize_symbols(&["msft", "AAPL", " Msft", "", "tsla"]);
        assert_eq!(out, vec!["MSFT", "AAPL", "TSLA"]);
    }

    #[test]
    fn derived_prices() {
        let q = Quote {
            bid: dec("150.20"),
            ask: dec("150.30"),
            last: dec("150.22"),
            change: dec("1.22"),
            ..Quote::empty("AAPL")
        };
        assert_eq!(q.mid(), dec("150.25"));
        assert_eq!(q.spread(), dec("0.10"));
        assert_eq!(q.previous_close(), dec("149.00"));
    }

    #[test]
    fn quote_set_lookup_is_case_insensitive() {
        let mut set = QuoteSet::new();
        assert!(set.upsert(quote("aapl", "1")));
        assert_eq!(set.get("AAPL").unwrap().symbol, "AAPL");
        assert_eq!(set.get(" aapl").unwrap().last, dec("1"));
        assert!(set.get("MSFT").is_none());
    }

    #[test]
    fn quote_set_upsert_replaces_wholesale() {
        let mut set = QuoteSet::new();
        set.upsert(quote("AAPL", "1"));
        set.upsert(quote("AAPL", "2"));
        assert_eq!(set.len(), 1);
        assert_eq!(set.get("AAPL").unwrap().last, dec("2"));
    }

    #[test]
    fn quote_set_rejects_blank_symbol() {
        let mut set = QuoteSet::new();
        assert!(!set.upsert(quote("  ", "1")));
        assert!(set.is_empty());
    }

    #[test]
    fn quote_set_replace_all_drops_stale_entries() {
        let mut set = QuoteSet::new();
        set.upsert(quote("AAPL", "1"));
        set.replace_all(vec![quote("MSFT", "2"), quote("TSLA", "3")]);
        assert_eq!(set.symbols().collect::<Vec<_>>(), vec!["MSFT", "TSLA"]);
        set.clear();
        assert!(set.is_empty());
    }

    #[test]
    fn connection_status_strings() {
        assert_eq!(ConnectionStatus::default(), ConnectionStatus::Disconnected);
        assert_eq!(ConnectionStatus::Connecting.to_string(), "connecting");
        assert_eq!(
            serde_json::to_string(&ConnectionStatus::Connected).unwrap(),
            "\"connected\""
        );
    }
}
