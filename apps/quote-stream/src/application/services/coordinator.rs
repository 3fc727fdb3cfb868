//! Quote Coordinator
//!
//! Single entry point for "track quotes for these symbols". Owns the
//! canonical [`QuotesState`], picks the active transport and falls back from
//! streaming to polling without surfacing transport errors to consumers.
//!
//! # Transport selection
//!
//! ```text
//!            start_tracking(symbols, credential)
//!                          │
//!           ┌──────────────┴──────────────┐
//!   streaming enabled              otherwise
//!   and credential set                 │
//!           │                          │
//!     connect + subscribe              │
//!      ok │        │ failed            │
//!         ▼        └──────────┐        │
//!    Streaming ──Failed──►  Polling ◄──┘
//! ```
//!
//! Every activation bumps an epoch. Listener callbacks and resumed awaits
//! compare their captured epoch with the current one and do nothing once a
//! newer `start_tracking`, `stop_tracking` or fallback has superseded them.

use std::sync::Arc;

use chrono::Utc;
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;

use crate::application::observers::ListenerHandle;
use crate::application::ports::{
    ConnectionEvent, CredentialSource, PollEvent, QuotePollerPort, QuoteStreamPort,
};
use crate::domain::quote::{ConnectionStatus, Quote, QuoteSet, normalize_symbols};
use crate::infrastructure::metrics;

// =============================================================================
// State
// =============================================================================

/// Which transport currently feeds the quote set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportMode {
    /// Nothing is tracked.
    #[default]
    None,
    /// Push updates over the streaming connection.
    Streaming,
    /// Interval polling over HTTP.
    Polling,
}

impl TransportMode {
    /// Mode name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Streaming => "streaming",
            Self::Polling => "polling",
        }
    }
}

/// Observable quote state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct QuotesState {
    /// Latest quote per tracked symbol.
    pub quotes: QuoteSet,
    /// A fetch is in flight.
    pub is_loading: bool,
    /// Human-readable error from the last failed fetch.
    pub error: Option<String>,
    /// When quotes last changed.
    pub last_updated_at: Option<chrono::DateTime<Utc>>,
    /// Quotes arrive over the streaming connection.
    pub is_streaming: bool,
    /// Streaming connection status.
    pub connection_status: ConnectionStatus,
    /// Active transport.
    pub transport: TransportMode,
}

/// Coordinator settings.
#[derive(Debug, Clone, Copy)]
pub struct CoordinatorConfig {
    /// Try streaming before polling when a credential is present.
    pub streaming_enabled: bool,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            streaming_enabled: true,
        }
    }
}

// =============================================================================
// Coordinator
// =============================================================================

#[derive(Default)]
struct Control {
    mode: TransportMode,
    symbols: Vec<String>,
    listeners: Vec<ListenerHandle>,
    epoch: u64,
}

struct Inner {
    stream: Arc<dyn QuoteStreamPort>,
    poller: Arc<dyn QuotePollerPort>,
    session: Option<Arc<dyn CredentialSource>>,
    config: CoordinatorConfig,
    state: watch::Sender<QuotesState>,
    control: Mutex<Control>,
}

/// Result of trying to bring up streaming.
enum StreamingOutcome {
    Active,
    Failed,
    Superseded,
}

/// Owns quote state and selects between streaming and polling.
///
/// Cloning is cheap; clones share the same state.
#[derive(Clone)]
pub struct QuoteCoordinator {
    inner: Arc<Inner>,
}

impl QuoteCoordinator {
    /// Create a coordinator over the two transports.
    ///
    /// `session` is invalidated when polling reports an authentication error.
    #[must_use]
    pub fn new(
        stream: Arc<dyn QuoteStreamPort>,
        poller: Arc<dyn QuotePollerPort>,
        session: Option<Arc<dyn CredentialSource>>,
        config: CoordinatorConfig,
    ) -> Self {
        let (state, _) = watch::channel(QuotesState::default());
        Self {
            inner: Arc::new(Inner {
                stream,
                poller,
                session,
                config,
                state,
                control: Mutex::new(Control::default()),
            }),
        }
    }

    // -------------------------------------------------------------------------
    // Tracking
    // -------------------------------------------------------------------------

    /// Replace the tracked symbol set.
    ///
    /// The previous transport is fully torn down first. An empty list clears
    /// state and leaves everything stopped. Otherwise streaming is tried when
    /// enabled and `credential` is set, with silent fallback to polling.
    pub async fn start_tracking<S: AsRef<str> + Sync>(
        &self,
        symbols: &[S],
        credential: Option<String>,
    ) {
        let symbols = normalize_symbols(symbols);
        let epoch = self.teardown();

        self.inner.control.lock().symbols.clone_from(&symbols);

        if symbols.is_empty() {
            tracing::debug!("No symbols to track");
            self.inner.state.send_modify(|s| {
                s.quotes.clear();
                s.is_loading = false;
                s.last_updated_at = None;
                s.is_streaming = false;
                s.connection_status = ConnectionStatus::Disconnected;
                s.transport = TransportMode::None;
            });
            return;
        }

        // drop quotes for symbols that are no longer tracked
        self.inner.state.send_modify(|s| {
            let kept: Vec<Quote> = s
                .quotes
                .iter()
                .filter(|q| symbols.contains(&q.symbol))
                .cloned()
                .collect();
            s.quotes.replace_all(kept);
        });

        let credential = credential.filter(|c| !c.trim().is_empty());
        match credential {
            Some(credential) if self.inner.config.streaming_enabled => {
                tracing::info!(symbols = symbols.len(), "Starting quote streaming");
                match self.start_streaming(epoch, &symbols, credential).await {
                    StreamingOutcome::Active | StreamingOutcome::Superseded => {}
                    StreamingOutcome::Failed => {
                        tracing::info!("Streaming unavailable, falling back to polling");
                        self.fallback_to_polling(epoch, "connect_failed").await;
                    }
                }
            }
            _ => {
                tracing::info!(symbols = symbols.len(), "Starting quote polling");
                self.start_polling(epoch, &symbols).await;
            }
        }
    }

    /// Tear down the active transport and clear quotes.
    ///
    /// Idempotent. The last error is kept; use [`Self::reset`] to clear it.
    pub fn stop_tracking(&self) {
        self.teardown();
        self.inner.control.lock().symbols.clear();
        self.inner.state.send_modify(|s| {
            s.quotes.clear();
            s.is_loading = false;
            s.last_updated_at = None;
            s.is_streaming = false;
            s.connection_status = ConnectionStatus::Disconnected;
            s.transport = TransportMode::None;
        });
    }

    /// Stop tracking and return to the initial state.
    pub fn reset(&self) {
        self.stop_tracking();
        self.inner.state.send_replace(QuotesState::default());
    }

    /// Clear the error field.
    pub fn clear_error(&self) {
        self.inner.state.send_if_modified(|s| s.error.take().is_some());
    }

    // -------------------------------------------------------------------------
    // Reads
    // -------------------------------------------------------------------------

    /// Current state.
    #[must_use]
    pub fn snapshot(&self) -> QuotesState {
        self.inner.state.borrow().clone()
    }

    /// Current quote for `symbol`, ignoring case.
    #[must_use]
    pub fn quote(&self, symbol: &str) -> Option<Quote> {
        self.inner.state.borrow().quotes.get(symbol).cloned()
    }

    /// Symbols currently tracked, normalized.
    #[must_use]
    pub fn tracked_symbols(&self) -> Vec<String> {
        self.inner.control.lock().symbols.clone()
    }

    /// Active transport.
    #[must_use]
    pub fn transport(&self) -> TransportMode {
        self.inner.control.lock().mode
    }

    /// Receiver observing every state change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<QuotesState> {
        self.inner.state.subscribe()
    }

    /// State changes as a `Stream`, starting with the current state.
    #[must_use]
    pub fn state_stream(&self) -> WatchStream<QuotesState> {
        WatchStream::new(self.inner.state.subscribe())
    }

    // -------------------------------------------------------------------------
    // Transport lifecycle
    // -------------------------------------------------------------------------

    /// Invalidate the current activation and stop whatever was running.
    ///
    /// Returns the new epoch.
    fn teardown(&self) -> u64 {
        let (handles, mode, epoch) = {
            let mut control = self.inner.control.lock();
            control.epoch += 1;
            let handles = std::mem::take(&mut control.listeners);
            let mode = std::mem::take(&mut control.mode);
            (handles, mode, control.epoch)
        };

        for handle in handles {
            handle.unregister();
        }

        match mode {
            TransportMode::Streaming => self.inner.stream.disconnect(),
            TransportMode::Polling => self.inner.poller.stop_polling(),
            TransportMode::None => {}
        }
        epoch
    }

    async fn start_streaming(
        &self,
        epoch: u64,
        symbols: &[String],
        credential: String,
    ) -> StreamingOutcome {
        let weak = Arc::downgrade(&self.inner);
        let quote_handle = self.inner.stream.on_quote_update(Box::new({
            let weak = weak.clone();
            move |quote| {
                if let Some(inner) = weak.upgrade() {
                    Self { inner }.apply_stream_quote(epoch, quote);
                }
            }
        }));
        let status_handle = self.inner.stream.on_connection_event(Box::new(move |event| {
            if let Some(inner) = weak.upgrade() {
                Self { inner }.apply_connection_event(epoch, event);
            }
        }));

        {
            let mut control = self.inner.control.lock();
            if control.epoch != epoch {
                drop(control);
                quote_handle.unregister();
                status_handle.unregister();
                return StreamingOutcome::Superseded;
            }
            control.mode = TransportMode::Streaming;
            control.listeners.push(quote_handle);
            control.listeners.push(status_handle);
        }

        self.inner.state.send_modify(|s| {
            s.is_streaming = true;
            s.is_loading = false;
            s.connection_status = ConnectionStatus::Connecting;
            s.transport = TransportMode::Streaming;
        });

        self.inner.stream.set_credential(Some(credential));

        let connected = self.inner.stream.connect().await;
        if !self.is_current(epoch) {
            return StreamingOutcome::Superseded;
        }
        if !connected {
            tracing::warn!("Streaming connect failed");
            return StreamingOutcome::Failed;
        }

        let result = self.inner.stream.subscribe_to_symbols(symbols).await;
        if !self.is_current(epoch) {
            return StreamingOutcome::Superseded;
        }
        match result {
            Ok(changes) => {
                tracing::debug!(
                    subscribed = changes.subscribe.len(),
                    unsubscribed = changes.unsubscribe.len(),
                    "Streaming subscriptions updated"
                );
                StreamingOutcome::Active
            }
            Err(e) => {
                tracing::warn!(error = %e, "Streaming subscribe failed");
                StreamingOutcome::Failed
            }
        }
    }

    /// Switch from streaming to polling for the activation `epoch`.
    async fn fallback_to_polling(&self, epoch: u64, reason: &'static str) {
        let (handles, symbols, next_epoch) = {
            let mut control = self.inner.control.lock();
            if control.epoch != epoch || control.mode != TransportMode::Streaming {
                return;
            }
            control.epoch += 1;
            control.mode = TransportMode::None;
            (
                std::mem::take(&mut control.listeners),
                control.symbols.clone(),
                control.epoch,
            )
        };

        for handle in handles {
            handle.unregister();
        }
        self.inner.stream.disconnect();
        metrics::record_fallback(reason);

        self.inner.state.send_modify(|s| {
            s.is_streaming = false;
            s.connection_status = ConnectionStatus::Disconnected;
        });

        self.start_polling(next_epoch, &symbols).await;
    }

    async fn start_polling(&self, epoch: u64, symbols: &[String]) {
        let weak = Arc::downgrade(&self.inner);
        let handle = self.inner.poller.on_poll_event(Box::new(move |event| {
            if let Some(inner) = weak.upgrade() {
                Self { inner }.apply_poll_event(epoch, event);
            }
        }));

        {
            let mut control = self.inner.control.lock();
            if control.epoch != epoch {
                drop(control);
                handle.unregister();
                return;
            }
            control.mode = TransportMode::Polling;
            control.listeners.push(handle);
        }

        self.inner.state.send_modify(|s| {
            s.is_streaming = false;
            s.connection_status = ConnectionStatus::Disconnected;
            s.transport = TransportMode::Polling;
        });

        self.inner.poller.start_polling(symbols).await;
    }

    fn is_current(&self, epoch: u64) -> bool {
        self.inner.control.lock().epoch == epoch
    }

    // -------------------------------------------------------------------------
    // Transport callbacks
    // -------------------------------------------------------------------------

    fn apply_stream_quote(&self, epoch: u64, quote: &Quote) {
        let control = self.inner.control.lock();
        if control.epoch != epoch {
            return;
        }
        self.inner.state.send_modify(|s| {
            s.quotes.upsert(quote.clone());
            s.last_updated_at = Some(Utc::now());
            s.error = None;
            s.is_loading = false;
        });
        drop(control);
    }

    fn apply_connection_event(&self, epoch: u64, event: &ConnectionEvent) {
        let control = self.inner.control.lock();
        if control.epoch != epoch {
            return;
        }
        match event {
            ConnectionEvent::Connected => {
                self.inner.state.send_modify(|s| {
                    s.connection_status = ConnectionStatus::Connected;
                    s.error = None;
                });
            }
            ConnectionEvent::Disconnected => {
                self.inner.state.send_modify(|s| {
                    s.connection_status = ConnectionStatus::Disconnected;
                });
            }
            ConnectionEvent::Reconnecting { attempt, .. } => {
                tracing::debug!(attempt, "Streaming reconnecting");
                self.inner.state.send_modify(|s| {
                    s.connection_status = ConnectionStatus::Connecting;
                });
            }
            ConnectionEvent::Failed(failure) => {
                drop(control);
                tracing::warn!(error = %failure, "Streaming gave up, falling back to polling");
                let this = self.clone();
                tokio::spawn(async move {
                    this.fallback_to_polling(epoch, "stream_failed").await;
                });
            }
        }
    }

    fn apply_poll_event(&self, epoch: u64, event: &PollEvent) {
        let control = self.inner.control.lock();
        if control.epoch != epoch {
            return;
        }
        match event {
            PollEvent::Fetching => {
                self.inner.state.send_modify(|s| s.is_loading = true);
            }
            PollEvent::Fetched(quotes) => {
                self.inner.state.send_modify(|s| {
                    s.quotes.replace_all(quotes.iter().cloned());
                    s.last_updated_at = Some(Utc::now());
                    s.error = None;
                    s.is_loading = false;
                });
            }
            PollEvent::Failed(error) => {
                self.inner.state.send_modify(|s| {
                    s.error = Some(error.to_string());
                    s.is_loading = false;
                });
                if error.is_unauthorized() {
                    drop(control);
                    self.abandon_after_auth_failure(epoch);
                }
            }
        }
    }

    /// Stop polling and drop the session after the credential was rejected.
    fn abandon_after_auth_failure(&self, epoch: u64) {
        let handles = {
            let mut control = self.inner.control.lock();
            if control.epoch != epoch {
                return;
            }
            control.epoch += 1;
            control.mode = TransportMode::None;
            std::mem::take(&mut control.listeners)
        };
        for handle in handles {
            handle.unregister();
        }

        tracing::warn!("Quote polling unauthorized, session invalidated");
        self.inner.poller.stop_polling();
        if let Some(session) = &self.inner.session {
            session.invalidate();
        }
        self.inner.state.send_modify(|s| {
            s.is_loading = false;
            s.transport = TransportMode::None;
        });
    }
}

impl std::fmt::Debug for QuoteCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let control = self.inner.control.lock();
        f.debug_struct("QuoteCoordinator")
            .field("mode", &control.mode)
            .field("symbols", &control.symbols)
            .field("epoch", &control.epoch)
            .finish_non_exhaustive()
    }
}
