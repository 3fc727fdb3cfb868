//! Quote Stream Port (Driven Port)
//!
//! Interface for a push transport that delivers quotes over a persistent
//! connection.

use std::time::Duration;

use async_trait::async_trait;

use crate::application::observers::ListenerHandle;
use crate::domain::quote::Quote;
use crate::domain::subscription::SubscriptionChanges;

/// Why a streaming transport gave up.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StreamFailure {
    /// Reconnect attempts were exhausted.
    #[error("Max reconnection attempts reached")]
    MaxReconnectAttempts,
    /// The server rejected the session credential.
    #[error("Streaming authentication rejected: {0}")]
    AuthRejected(String),
}

/// Lifecycle notifications from a streaming transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    /// The connection opened and authentication was sent.
    Connected,
    /// The connection closed.
    Disconnected,
    /// A reconnect attempt is scheduled.
    Reconnecting {
        /// Attempt number, starting at 1.
        attempt: u32,
        /// Delay before the attempt.
        delay: Duration,
    },
    /// The transport stopped trying and needs an explicit restart.
    Failed(StreamFailure),
}

/// Streaming transport error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StreamingError {
    /// No credential is set.
    #[error("no streaming credential set")]
    MissingCredential,

    /// The connection is not open and could not be opened.
    #[error("streaming connection is not open")]
    NotConnected,

    /// The transport was closed while the operation was in flight.
    #[error("streaming connection closed by disconnect")]
    Closed,

    /// Sending a frame failed.
    #[error("failed to send frame: {0}")]
    Send(String),
}

/// Callback receiving quote snapshots.
pub type QuoteListener = Box<dyn Fn(&Quote) + Send + Sync>;

/// Callback receiving connection lifecycle events.
pub type ConnectionListener = Box<dyn Fn(&ConnectionEvent) + Send + Sync>;

/// Port for a push-based quote transport.
#[async_trait]
pub trait QuoteStreamPort: Send + Sync {
    /// Replace the credential used for authentication and reconnects.
    fn set_credential(&self, credential: Option<String>);

    /// Open the connection if needed. Resolves `false` on timeout or error.
    async fn connect(&self) -> bool;

    /// Move the subscribed set to `symbols`, sending only the difference.
    ///
    /// Connects first when disconnected. If that fails nothing is sent and
    /// `StreamingError::NotConnected` is returned.
    async fn subscribe_to_symbols(
        &self,
        symbols: &[String],
    ) -> Result<SubscriptionChanges, StreamingError>;

    /// Close the connection intentionally and forget subscriptions.
    fn disconnect(&self);

    /// Register a quote listener.
    fn on_quote_update(&self, listener: QuoteListener) -> ListenerHandle;

    /// Register a connection lifecycle listener.
    fn on_connection_event(&self, listener: ConnectionListener) -> ListenerHandle;

    /// Whether the connection is currently open.
    fn is_connected(&self) -> bool;
}
