//! HTTP Quote Fetcher
//!
//! REST implementation of `QuoteFetcherPort`. Each symbol in a batch is
//! requested concurrently from `GET {api}/market-data/{SYMBOL}` with the
//! session token as a bearer credential.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;

use crate::application::ports::{CredentialSource, FetchError, QuoteFetcherPort};
use crate::domain::quote::{Quote, normalize_symbol};
use crate::infrastructure::streaming::codec::{parse_decimal, parse_flag};

/// HTTP fetcher configuration.
#[derive(Debug, Clone)]
pub struct HttpFetcherConfig {
    /// API base URL, without the `/market-data` suffix.
    pub base_url: String,
    /// Per-request timeout.
    pub request_timeout: Duration,
}

impl HttpFetcherConfig {
    /// Create a configuration with a 10 second request timeout.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            request_timeout: Duration::from_secs(10),
        }
    }
}

// =============================================================================
// Wire Types
// =============================================================================

#[derive(Debug, Deserialize)]
struct MarketDataResponse {
    data: MarketDataItem,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct MarketDataItem {
    #[serde(default, alias = "bid")]
    bid_price: Value,
    #[serde(default, alias = "ask")]
    ask_price: Value,
    #[serde(default, alias = "last")]
    last_price: Value,
    #[serde(default)]
    net_change: Value,
    #[serde(default)]
    net_change_percent: Value,
    #[serde(default)]
    is_trading_halted: Value,
}

impl MarketDataItem {
    fn into_quote(self, symbol: String) -> Quote {
        let field = |value: &Value| parse_decimal(value).unwrap_or(Decimal::ZERO);
        Quote {
            bid: field(&self.bid_price),
            ask: field(&self.ask_price),
            last: field(&self.last_price),
            change: field(&self.net_change),
            change_percent: field(&self.net_change_percent),
            updated_at: Utc::now(),
            trading_halted: parse_flag(&self.is_trading_halted),
            symbol,
        }
    }
}

/// Result of fetching one symbol.
#[derive(Debug)]
enum SymbolOutcome {
    Quote(Quote),
    Unauthorized,
    Omitted { network_error: Option<String> },
}

// =============================================================================
// Fetcher
// =============================================================================

/// reqwest-backed quote fetcher.
pub struct HttpQuoteFetcher {
    http_client: reqwest::Client,
    base_url: String,
    credentials: Arc<dyn CredentialSource>,
}

impl std::fmt::Debug for HttpQuoteFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpQuoteFetcher")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl HttpQuoteFetcher {
    /// Create a fetcher reading the token from `credentials` on every batch.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be built.
    pub fn new(
        config: &HttpFetcherConfig,
        credentials: Arc<dyn CredentialSource>,
    ) -> Result<Self, FetchError> {
        let http_client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| FetchError::Network {
                message: e.to_string(),
            })?;

        Ok(Self {
            http_client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            credentials,
        })
    }

    async fn fetch_one(&self, symbol: String, token: &str) -> SymbolOutcome {
        let url = format!("{}/market-data/{symbol}", self.base_url);

        let response = match self.http_client.get(&url).bearer_auth(token).send().await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(symbol = %symbol, error = %e, "Quote request failed");
                return SymbolOutcome::Omitted {
                    network_error: Some(e.to_string()),
                };
            }
        };

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return SymbolOutcome::Unauthorized;
        }
        if !status.is_success() {
            tracing::warn!(symbol = %symbol, status = status.as_u16(), "Quote request rejected");
            return SymbolOutcome::Omitted {
                network_error: None,
            };
        }

        match response.json::<MarketDataResponse>().await {
            Ok(body) => SymbolOutcome::Quote(body.data.into_quote(symbol)),
            Err(e) => {
                tracing::warn!(symbol = %symbol, error = %e, "Invalid quote response");
                SymbolOutcome::Omitted {
                    network_error: None,
                }
            }
        }
    }
}

#[async_trait]
impl QuoteFetcherPort for HttpQuoteFetcher {
    async fn fetch_quotes(&self, symbols: &[String]) -> Result<Vec<Quote>, FetchError> {
        let symbols: Vec<String> = symbols.iter().filter_map(|s| normalize_symbol(s)).collect();
        if symbols.is_empty() {
            return Ok(Vec::new());
        }

        let Some(token) = self.credentials.credential() else {
            return Err(FetchError::Unauthorized);
        };

        let outcomes = futures::future::join_all(
            symbols
                .into_iter()
                .map(|symbol| self.fetch_one(symbol, &token)),
        )
        .await;

        let mut quotes = Vec::with_capacity(outcomes.len());
        let mut network_error = None;
        for outcome in outcomes {
            match outcome {
                SymbolOutcome::Quote(quote) => quotes.push(quote),
                SymbolOutcome::Unauthorized => return Err(FetchError::Unauthorized),
                SymbolOutcome::Omitted {
                    network_error: Some(message),
                } if network_error.is_none() => network_error = Some(message),
                SymbolOutcome::Omitted { .. } => {}
            }
        }

        if quotes.is_empty() {
            return Err(network_error.map_or(FetchError::NoQuotes, |message| {
                FetchError::Network { message }
            }));
        }
        Ok(quotes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    struct NoSession;

    impl CredentialSource for NoSession {
        fn credential(&self) -> Option<String> {
            None
        }

        fn invalidate(&self) {}
    }

    #[test]
    fn item_accepts_kebab_and_short_names() {
        let kebab: MarketDataItem = serde_json::from_str(
            r#"{"bid-price":"150.20","ask-price":150.25,"last-price":"150.22","net-change":"-1.5","net-change-percent":"-0.99"}"#,
        )
        .unwrap();
        let quote = kebab.into_quote("AAPL".into());
        assert_eq!(quote.bid, Decimal::from_str("150.20").unwrap());
        assert_eq!(quote.ask, Decimal::from_str("150.25").unwrap());
        assert_eq!(quote.change, Decimal::from_str("-1.5").unwrap());

        let short: MarketDataItem =
            serde_json::from_str(r#"{"bid":"1.00","ask":"1.10","last":"1.05"}"#).unwrap();
        let quote = short.into_quote("X".into());
        assert_eq!(quote.last, Decimal::from_str("1.05").unwrap());
        assert_eq!(quote.change_percent, Decimal::ZERO);
        assert!(!quote.trading_halted);
    }

    #[tokio::test]
    async fn missing_token_is_unauthorized() {
        let fetcher =
            HttpQuoteFetcher::new(&HttpFetcherConfig::new("http://127.0.0.1:9"), Arc::new(NoSession))
                .unwrap();
        let result = fetcher.fetch_quotes(&["AAPL".to_string()]).await;
        assert_eq!(result, Err(FetchError::Unauthorized));
    }

    #[tokio::test]
    async fn empty_batch_is_empty() {
        let fetcher =
            HttpQuoteFetcher::new(&HttpFetcherConfig::new("http://127.0.0.1:9"), Arc::new(NoSession))
                .unwrap();
        assert_eq!(fetcher.fetch_quotes(&[]).await, Ok(Vec::new()));
    }
}
