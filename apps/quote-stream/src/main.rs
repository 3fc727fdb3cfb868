//! Quote Stream Binary
//!
//! Tracks a fixed symbol list and logs every quote state change.
//!
//! # Usage
//!
//! ```bash
//! QUOTES_SYMBOLS=AAPL,MSFT QUOTES_SESSION_TOKEN=... cargo run --bin quote-stream
//! ```
//!
//! # Environment Variables
//!
//! - `QUOTES_SYMBOLS`: Comma separated symbols to track
//! - `QUOTES_SESSION_TOKEN`: Session token (polling only works with one too)
//! - `QUOTES_API_URL`: HTTP quote API (default: <https://api.cert.tastyworks.com>)
//! - `QUOTES_STREAM_URL`: Streaming endpoint (default: <wss://streamer.cert.tastyworks.com>)
//! - `QUOTES_ENABLE_STREAMING`: "false" forces polling (default: true)
//! - `QUOTES_POLL_INTERVAL_SECS`: Polling period (default: 5)
//! - `QUOTES_METRICS_PORT`: Prometheus metrics port (default: 0, disabled)
//! - `OTEL_ENABLED`: Export traces over OTLP (default: false)
//! - `RUST_LOG`: Log filter (default: `quote_stream=info`)

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use quote_stream::application::ports::{CredentialSource, QuotePollerPort, QuoteStreamPort};
use quote_stream::domain::format::{format_change, format_last_updated, format_percentage, format_price};
use quote_stream::infrastructure::telemetry;
use quote_stream::{
    ClientConfig, CoordinatorConfig, HttpFetcherConfig, HttpQuoteFetcher, PollingClient,
    QuoteCoordinator, QuotesState, SessionStore, StreamingClient, StreamingClientConfig,
    follow_watchlist, init_metrics,
};
use rust_decimal::prelude::ToPrimitive;
use tokio::signal;
use tokio::sync::watch;
use tokio_stream::StreamExt;
use tokio_util::sync::CancellationToken;

/// Time allowed for tracking to stop after a shutdown signal.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("failed to install rustls crypto provider"))?;

    load_dotenv();

    let _telemetry_guard = telemetry::init();

    tracing::info!("Starting Quote Stream");

    let config = ClientConfig::from_env().context("invalid configuration")?;
    log_config(&config);

    if config.metrics_port > 0 {
        let addr = SocketAddr::from(([0, 0, 0, 0], config.metrics_port));
        init_metrics(addr).context("failed to start metrics exporter")?;
    }

    let session = Arc::new(SessionStore::new());
    if let Some(token) = &config.session_token {
        session.set_token(token.clone());
    }
    let credentials: Arc<dyn CredentialSource> = session.clone();

    let stream: Arc<dyn QuoteStreamPort> = Arc::new(StreamingClient::new(
        StreamingClientConfig::from_settings(&config.streaming),
    ));

    let fetcher = HttpQuoteFetcher::new(
        &HttpFetcherConfig {
            base_url: config.api.base_url.clone(),
            request_timeout: config.api.request_timeout,
        },
        Arc::clone(&credentials),
    )
    .context("failed to build HTTP client")?;
    let poller: Arc<dyn QuotePollerPort> =
        Arc::new(PollingClient::new(Arc::new(fetcher), config.polling.interval));

    let coordinator = QuoteCoordinator::new(
        stream,
        poller,
        Some(Arc::clone(&credentials)),
        CoordinatorConfig {
            streaming_enabled: config.streaming.enabled,
        },
    );

    let shutdown_token = CancellationToken::new();

    tokio::spawn(log_state_changes(
        coordinator.clone(),
        shutdown_token.clone(),
    ));

    let (symbols_tx, symbols_rx) = watch::channel(config.symbols.clone());
    let follower = tokio::spawn(follow_watchlist(
        coordinator.clone(),
        symbols_rx,
        credentials,
        shutdown_token.clone(),
    ));

    tracing::info!("Quote stream ready");

    await_shutdown(shutdown_token).await;

    if tokio::time::timeout(SHUTDOWN_TIMEOUT, follower).await.is_err() {
        tracing::warn!("Tracking did not stop in time");
        coordinator.stop_tracking();
    }
    drop(symbols_tx);

    tracing::info!("Quote stream stopped");
    Ok(())
}

/// Log each published state until shutdown.
async fn log_state_changes(coordinator: QuoteCoordinator, shutdown: CancellationToken) {
    let mut states = coordinator.state_stream();
    loop {
        tokio::select! {
            () = shutdown.cancelled() => break,
            state = states.next() => match state {
                Some(state) => log_state(&state),
                None => break,
            },
        }
    }
}

fn log_state(state: &QuotesState) {
    tracing::info!(
        transport = state.transport.as_str(),
        connection = state.connection_status.as_str(),
        streaming = state.is_streaming,
        loading = state.is_loading,
        error = state.error.as_deref().unwrap_or(""),
        updated = %format_last_updated(state.last_updated_at, chrono::Utc::now()),
        "Quote state"
    );

    for quote in state.quotes.iter() {
        let as_f64 = |d: rust_decimal::Decimal| d.to_f64().unwrap_or(f64::NAN);
        tracing::info!(
            symbol = %quote.symbol,
            bid = %format_price(as_f64(quote.bid)),
            ask = %format_price(as_f64(quote.ask)),
            last = %format_price(as_f64(quote.last)),
            change = %format_change(as_f64(quote.change)),
            change_percent = %format_percentage(as_f64(quote.change_percent)),
            "Quote"
        );
    }
}

/// Log the parsed configuration.
fn log_config(config: &ClientConfig) {
    tracing::info!(
        api_url = %config.api.base_url,
        stream_url = %config.streaming.url,
        streaming_enabled = config.streaming.enabled,
        poll_interval_secs = config.polling.interval.as_secs(),
        metrics_port = config.metrics_port,
        symbols = config.symbols.len(),
        has_session = config.session_token.is_some(),
        "Configuration loaded"
    );
}

/// Load .env file from current directory or any ancestor directory.
fn load_dotenv() {
    if dotenvy::dotenv().is_ok() {
        return;
    }

    if let Ok(cwd) = std::env::current_dir() {
        let mut dir = cwd.as_path();
        while let Some(parent) = dir.parent() {
            let env_path = parent.join(".env");
            if env_path.exists() {
                let _ = dotenvy::from_path(&env_path);
                return;
            }
            dir = parent;
        }
    }
}

/// Wait for shutdown signal (SIGTERM or SIGINT).
async fn await_shutdown(shutdown_token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, initiating shutdown");
        }
    }

    shutdown_token.cancel();
}
