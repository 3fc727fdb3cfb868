//! Quote Polling Adapter
//!
//! HTTP fallback transport: a reqwest fetcher and the interval poller that
//! drives it.

pub mod client;
pub mod http;

pub use client::{DEFAULT_POLL_INTERVAL, PollingClient};
pub use http::{HttpFetcherConfig, HttpQuoteFetcher};
