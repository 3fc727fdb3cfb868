//! Prometheus Metrics Module
//!
//! Exposes quote delivery metrics in Prometheus format.
//!
//! # Metrics Categories
//!
//! - **Frames**: Stream frames received and dropped
//! - **Quotes**: Quotes delivered per transport
//! - **Connection**: Streaming connection state and reconnect attempts
//! - **Polling**: Poll cycles and fetch latency
//! - **Coordinator**: Fallbacks from streaming to polling
//!
//! Recording functions are no-ops until [`init_metrics`] installs the
//! exporter, so library code and tests can call them freely.

use std::net::SocketAddr;
use std::time::Duration;

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

// =============================================================================
// Exporter
// =============================================================================

/// Error type for metrics operations.
#[derive(Debug, thiserror::Error)]
pub enum MetricsError {
    /// Failed to install the exporter (e.g. port already in use).
    #[error("metrics installation error: {0}")]
    Installation(String),
}

/// Start the Prometheus exporter serving `/metrics` on `addr`.
///
/// Must be called from within a Tokio runtime.
///
/// # Errors
///
/// Returns an error if the exporter cannot be installed.
pub fn init_metrics(addr: SocketAddr) -> Result<(), MetricsError> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| MetricsError::Installation(e.to_string()))?;

    register_metrics();
    tracing::info!(addr = %addr, "Prometheus metrics exporter started");
    Ok(())
}

fn register_metrics() {
    describe_counter!(
        "quote_stream_frames_received_total",
        "Total text frames received from the quote stream"
    );
    describe_counter!(
        "quote_stream_frames_dropped_total",
        "Total frames or entries dropped as malformed"
    );
    describe_counter!(
        "quote_stream_quotes_delivered_total",
        "Total quotes delivered to the coordinator by transport"
    );

    describe_gauge!(
        "quote_stream_connected",
        "Whether the streaming connection is open (1) or not (0)"
    );
    describe_gauge!(
        "quote_stream_subscriptions",
        "Number of symbols subscribed on the stream"
    );
    describe_counter!(
        "quote_stream_reconnects_total",
        "Total streaming reconnect attempts"
    );

    describe_counter!(
        "quote_stream_polls_total",
        "Total poll cycles by outcome"
    );
    describe_histogram!(
        "quote_stream_poll_duration_seconds",
        "Time to fetch one batch of quotes over HTTP"
    );

    describe_counter!(
        "quote_stream_fallbacks_total",
        "Total fallbacks from streaming to polling by reason"
    );
}

// =============================================================================
// Metric Recording Functions
// =============================================================================

/// Metric labels for quote transports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    /// WebSocket streaming.
    Streaming,
    /// HTTP polling.
    Polling,
}

impl Transport {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Streaming => "streaming",
            Self::Polling => "polling",
        }
    }
}

/// Record a text frame received from the stream.
pub fn record_frame_received() {
    counter!("quote_stream_frames_received_total").increment(1);
}

/// Record a dropped frame or entry.
pub fn record_frame_dropped(kind: &'static str) {
    counter!("quote_stream_frames_dropped_total", "kind" => kind).increment(1);
}

/// Record quotes handed to listeners.
pub fn record_quotes_delivered(transport: Transport, count: u64) {
    counter!(
        "quote_stream_quotes_delivered_total",
        "transport" => transport.as_str()
    )
    .increment(count);
}

/// Update the streaming connection gauge.
pub fn set_streaming_connected(connected: bool) {
    gauge!("quote_stream_connected").set(if connected { 1.0 } else { 0.0 });
}

/// Update the stream subscription gauge.
#[allow(clippy::cast_precision_loss)]
pub fn set_active_subscriptions(count: usize) {
    gauge!("quote_stream_subscriptions").set(count as f64);
}

/// Record a scheduled reconnect attempt.
pub fn record_reconnect_attempt() {
    counter!("quote_stream_reconnects_total").increment(1);
}

/// Record one poll cycle and its fetch latency.
pub fn record_poll(outcome: &'static str, duration: Duration) {
    counter!("quote_stream_polls_total", "outcome" => outcome).increment(1);
    histogram!("quote_stream_poll_duration_seconds").record(duration.as_secs_f64());
}

/// Record a fallback from streaming to polling.
pub fn record_fallback(reason: &'static str) {
    counter!("quote_stream_fallbacks_total", "reason" => reason).increment(1);
}
