//! Quote Poller Port (Driven Port)
//!
//! Interface for a pull transport that re-fetches a symbol batch on a fixed
//! interval.

use async_trait::async_trait;

use super::FetchError;
use crate::application::observers::ListenerHandle;
use crate::domain::quote::Quote;

/// Notifications from a polling cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollEvent {
    /// A fetch is about to start.
    Fetching,
    /// A fetch produced quotes for the whole batch.
    Fetched(Vec<Quote>),
    /// A fetch failed. Polling continues unless the error is `Unauthorized`.
    Failed(FetchError),
}

/// Callback receiving poll events.
pub type PollListener = Box<dyn Fn(&PollEvent) + Send + Sync>;

/// Port for interval-driven quote polling.
#[async_trait]
pub trait QuotePollerPort: Send + Sync {
    /// Replace any running poll with one for `symbols`.
    ///
    /// Fetches once before returning, then keeps fetching on the interval
    /// until stopped.
    async fn start_polling(&self, symbols: &[String]);

    /// Stop polling. Safe to call when idle.
    fn stop_polling(&self);

    /// Register a poll event listener.
    fn on_poll_event(&self, listener: PollListener) -> ListenerHandle;

    /// Whether a poll loop is active.
    fn is_polling(&self) -> bool;
}
