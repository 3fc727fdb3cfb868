#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::float_cmp,
        clippy::significant_drop_tightening,
        clippy::too_many_lines,
        clippy::needless_pass_by_value,
        clippy::items_after_statements
    )
)]

//! Quote Stream - Watchlist Quote Delivery
//!
//! Keeps one logical stream of per-symbol quotes for a watchlist. Quotes
//! arrive over a WebSocket push feed when a session token is available and
//! over HTTP polling otherwise, with automatic fallback when streaming fails.
//!
//! # Layers (inside → outside)
//!
//! - **Domain**: Quote types and rules with no I/O
//!   - `quote`: Quote snapshots, the keyed quote set, connection status
//!   - `subscription`: Subscription set diffing
//!   - `format`: Price, change and timestamp display formatting
//!
//! - **Application**: Services and port definitions
//!   - `ports`: Interfaces for the two transports and the session holder
//!   - `observers`: Listener registries with isolated fan-out
//!   - `services`: Quote coordinator, session store, watchlist follower
//!
//! - **Infrastructure**: Adapters and external integrations
//!   - `streaming`: WebSocket client with keep-alive and reconnect
//!   - `polling`: HTTP fetcher and interval poller
//!   - `config`: Environment configuration
//!   - `metrics`, `telemetry`: Observability
//!
//! # Data Flow
//!
//! ```text
//!                      ┌──────────────────┐
//! watchlist symbols ──►│                  │──► QuotesState (watch)
//!                      │ QuoteCoordinator │
//! session token ──────►│                  │
//!                      └───┬──────────▲───┘
//!                          │          │ quotes / status
//!               streaming  │          │  (fallback on failure)
//!                  ┌───────▼──┐    ┌──┴────────┐
//!                  │ WebSocket│    │  Polling  │
//!                  │  client  │    │  client   │
//!                  └──────────┘    └───────────┘
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

// =============================================================================
// Module Declarations
// =============================================================================

/// Domain layer - Core quote types with no external dependencies.
pub mod domain;

/// Application layer - Services and port definitions.
pub mod application;

/// Infrastructure layer - Adapters and external integrations.
pub mod infrastructure;

// =============================================================================
// Re-exports
// =============================================================================

// Domain types
pub use domain::quote::{ConnectionStatus, Quote, QuoteSet, normalize_symbol, normalize_symbols};
pub use domain::subscription::{SubscriptionChanges, SubscriptionSet, Symbol};

// Application services
pub use application::services::{
    CoordinatorConfig, QuoteCoordinator, QuotesState, SessionStore, TransportMode,
    follow_watchlist,
};

// Adapters
pub use infrastructure::polling::{HttpFetcherConfig, HttpQuoteFetcher, PollingClient};
pub use infrastructure::streaming::{StreamingClient, StreamingClientConfig};

// Infrastructure config
pub use infrastructure::config::{
    ApiSettings, ClientConfig, ConfigError, PollingSettings, StreamingSettings,
};

// Metrics
pub use infrastructure::metrics::{MetricsError, init_metrics};

// Telemetry
pub use infrastructure::telemetry::{TelemetryConfig, TelemetryGuard, init as init_telemetry};
