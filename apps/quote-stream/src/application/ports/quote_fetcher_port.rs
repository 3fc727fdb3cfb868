//! Quote Fetcher Port (Driven Port)
//!
//! Interface for pulling quote snapshots on demand.

use async_trait::async_trait;

use crate::domain::quote::Quote;

/// Quote fetch error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    /// The credential is missing or was rejected.
    #[error("Authentication required")]
    Unauthorized,

    /// The request could not be completed.
    #[error("Network error: {message}")]
    Network {
        /// Error details.
        message: String,
    },

    /// The server answered with an unexpected status.
    #[error("Quote request failed with status {status}")]
    Api {
        /// HTTP status code.
        status: u16,
    },

    /// The response body could not be decoded.
    #[error("Invalid quote response: {message}")]
    Decode {
        /// Error details.
        message: String,
    },

    /// None of the requested symbols produced a quote.
    #[error("No quotes returned")]
    NoQuotes,
}

impl FetchError {
    /// Whether this is an authentication failure that must not be retried.
    #[must_use]
    pub const fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Unauthorized)
    }

    /// Short label for metrics.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Unauthorized => "unauthorized",
            Self::Network { .. } => "network",
            Self::Api { .. } => "api",
            Self::Decode { .. } => "decode",
            Self::NoQuotes => "no_quotes",
        }
    }
}

/// Port for fetching quotes in batches.
#[async_trait]
pub trait QuoteFetcherPort: Send + Sync {
    /// Fetch the latest quote for each symbol.
    ///
    /// Symbols that fail individually are omitted from the result.
    async fn fetch_quotes(&self, symbols: &[String]) -> Result<Vec<Quote>, FetchError>;
}
