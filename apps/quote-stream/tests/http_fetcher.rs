//! HTTP Quote Fetcher Integration Tests
//!
//! Exercises the reqwest fetcher against a wiremock server.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;
use serde_json::json;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use quote_stream::application::ports::{FetchError, QuoteFetcherPort};
use quote_stream::{HttpFetcherConfig, HttpQuoteFetcher, SessionStore};

fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

fn fetcher(server: &MockServer, session: &Arc<SessionStore>) -> HttpQuoteFetcher {
    let mut config = HttpFetcherConfig::new(format!("{}/", server.uri()));
    config.request_timeout = Duration::from_secs(2);
    HttpQuoteFetcher::new(&config, Arc::clone(session) as _).unwrap()
}

async fn mount_quote(server: &MockServer, symbol: &str, body: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path(format!("/market-data/{symbol}")))
        .and(header("authorization", "Bearer tok"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": body })))
        .mount(server)
        .await;
}

#[tokio::test]
async fn fetches_each_symbol_with_bearer_token() {
    let server = MockServer::start().await;
    mount_quote(
        &server,
        "AAPL",
        json!({
            "bid-price": "150.20",
            "ask-price": "150.25",
            "last-price": "150.22",
            "net-change": "1.5",
            "net-change-percent": "1.01",
            "is-trading-halted": false
        }),
    )
    .await;
    mount_quote(
        &server,
        "MSFT",
        json!({ "bid": 410.1, "ask": 410.2, "last": 410.15 }),
    )
    .await;

    let session = Arc::new(SessionStore::with_token("tok"));
    let quotes = fetcher(&server, &session)
        .fetch_quotes(&["aapl".to_string(), " msft ".to_string()])
        .await
        .unwrap();

    assert_eq!(quotes.len(), 2);
    let aapl = quotes.iter().find(|q| q.symbol == "AAPL").unwrap();
    assert_eq!(aapl.bid, dec("150.20"));
    assert_eq!(aapl.last, dec("150.22"));
    assert_eq!(aapl.change, dec("1.5"));
    assert_eq!(aapl.change_percent, dec("1.01"));
    assert!(!aapl.trading_halted);

    let msft = quotes.iter().find(|q| q.symbol == "MSFT").unwrap();
    assert_eq!(msft.ask, dec("410.2"));
    assert_eq!(msft.change, Decimal::ZERO);
}

#[tokio::test]
async fn failed_symbols_are_omitted() {
    let server = MockServer::start().await;
    mount_quote(&server, "AAPL", json!({ "last-price": "1.25" })).await;
    Mock::given(method("GET"))
        .and(path("/market-data/NOPE"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/market-data/BAD"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    let session = Arc::new(SessionStore::with_token("tok"));
    let quotes = fetcher(&server, &session)
        .fetch_quotes(&["AAPL".into(), "NOPE".into(), "BAD".into()])
        .await
        .unwrap();

    assert_eq!(quotes.len(), 1);
    assert_eq!(quotes[0].symbol, "AAPL");
    assert_eq!(quotes[0].last, dec("1.25"));
}

#[tokio::test]
async fn unauthorized_response_fails_the_batch() {
    let server = MockServer::start().await;
    mount_quote(&server, "AAPL", json!({ "last-price": "1.25" })).await;
    Mock::given(method("GET"))
        .and(path("/market-data/MSFT"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let session = Arc::new(SessionStore::with_token("tok"));
    let result = fetcher(&server, &session)
        .fetch_quotes(&["AAPL".into(), "MSFT".into()])
        .await;

    assert!(matches!(result, Err(FetchError::Unauthorized)));
}

#[tokio::test]
async fn no_usable_quotes_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let session = Arc::new(SessionStore::with_token("tok"));
    let result = fetcher(&server, &session)
        .fetch_quotes(&["AAPL".into(), "MSFT".into()])
        .await;

    assert!(matches!(result, Err(FetchError::NoQuotes)));
}

#[tokio::test]
async fn unreachable_server_reports_network_error() {
    let server = MockServer::start().await;
    let session = Arc::new(SessionStore::with_token("tok"));
    let fetcher = fetcher(&server, &session);
    drop(server);

    let result = fetcher.fetch_quotes(&["AAPL".into()]).await;

    assert!(matches!(result, Err(FetchError::Network { .. })));
}

#[tokio::test]
async fn logged_out_session_skips_the_request() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let session = Arc::new(SessionStore::new());
    let result = fetcher(&server, &session)
        .fetch_quotes(&["AAPL".into()])
        .await;

    assert!(matches!(result, Err(FetchError::Unauthorized)));
}
