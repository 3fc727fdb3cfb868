//! Streaming WebSocket Client
//!
//! Maintains one authenticated WebSocket session to the quote streamer,
//! diffs symbol subscriptions, fans quotes out to listeners and reconnects
//! with exponential backoff after unintentional closes.
//!
//! # Lifecycle
//!
//! ```text
//! disconnected ──connect()──► connecting ──open──► connected
//!      ▲                                              │
//!      │           unintentional close                │
//!      └──── reconnect timer ◄────────────────────────┘
//! ```
//!
//! Each open connection is served by one session task that owns the socket.
//! Outbound frames are queued to it over a channel so frame order matches
//! call order. The subscription set survives an unintentional close and is
//! re-sent after login on whichever open comes next, timer or explicit.
//! Quote listeners run on the session task, one frame at a time.
//!
//! Every `disconnect()` bumps a generation counter. A `connect()` that was
//! pending when the generation changed closes its fresh socket instead of
//! installing it, so a late open never revives a stopped client.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use parking_lot::{Mutex, RwLock};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;

use super::auth::{AuthState, SessionCredential};
use super::codec::{JsonCodec, StreamMessage};
use super::heartbeat::{ActivityState, KeepAliveConfig, KeepAliveEvent, KeepAliveManager};
use super::messages::OutboundFrame;
use super::reconnect::{ReconnectConfig, ReconnectPolicy};
use crate::application::observers::{ListenerHandle, ObserverRegistry};
use crate::application::ports::{
    ConnectionEvent, ConnectionListener, QuoteListener, QuoteStreamPort, StreamFailure,
    StreamingError,
};
use crate::domain::quote::Quote;
use crate::domain::subscription::{SubscriptionChanges, SubscriptionSet};
use crate::infrastructure::metrics::{self, Transport};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

// =============================================================================
// Configuration
// =============================================================================

/// Configuration for the streaming client.
#[derive(Debug, Clone)]
pub struct StreamingClientConfig {
    /// WebSocket URL.
    pub url: String,
    /// Bound on opening the connection.
    pub connect_timeout: Duration,
    /// Reconnection configuration.
    pub reconnect: ReconnectConfig,
    /// Keep-alive configuration.
    pub keepalive: KeepAliveConfig,
}

impl StreamingClientConfig {
    /// Create a configuration with default timings.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            connect_timeout: Duration::from_secs(10),
            reconnect: ReconnectConfig::default(),
            keepalive: KeepAliveConfig::default(),
        }
    }

    /// Create configuration from `StreamingSettings`.
    #[must_use]
    pub fn from_settings(settings: &crate::StreamingSettings) -> Self {
        Self {
            url: settings.url.clone(),
            connect_timeout: settings.connect_timeout,
            reconnect: ReconnectConfig::from_settings(settings),
            keepalive: KeepAliveConfig::from_settings(settings),
        }
    }
}

// =============================================================================
// Client
// =============================================================================

/// Why a session task stopped.
#[derive(Debug)]
enum SessionEnd {
    Cancelled,
    ClosedByServer,
    IdleTimeout,
    Error(String),
    AuthRejected(String),
}

struct Session {
    outbound: mpsc::UnboundedSender<Message>,
    cancel: CancellationToken,
    generation: u64,
}

struct Inner {
    config: StreamingClientConfig,
    codec: JsonCodec,
    credential: RwLock<Option<SessionCredential>>,
    session: Mutex<Option<Session>>,
    reconnect_timer: Mutex<Option<CancellationToken>>,
    subscriptions: Mutex<SubscriptionSet>,
    policy: Mutex<ReconnectPolicy>,
    auth: RwLock<AuthState>,
    intentional_close: AtomicBool,
    generation: AtomicU64,
    connect_lock: tokio::sync::Mutex<()>,
    quote_listeners: ObserverRegistry<Quote>,
    connection_listeners: ObserverRegistry<ConnectionEvent>,
}

/// WebSocket quote streaming client.
///
/// Cloning is cheap; clones share the same connection.
#[derive(Clone)]
pub struct StreamingClient {
    inner: Arc<Inner>,
}

impl StreamingClient {
    /// Create a disconnected client.
    #[must_use]
    pub fn new(config: StreamingClientConfig) -> Self {
        let policy = ReconnectPolicy::new(config.reconnect.clone());
        Self {
            inner: Arc::new(Inner {
                config,
                codec: JsonCodec::new(),
                credential: RwLock::new(None),
                session: Mutex::new(None),
                reconnect_timer: Mutex::new(None),
                subscriptions: Mutex::new(SubscriptionSet::new()),
                policy: Mutex::new(policy),
                auth: RwLock::new(AuthState::Disconnected),
                intentional_close: AtomicBool::new(false),
                generation: AtomicU64::new(0),
                connect_lock: tokio::sync::Mutex::new(()),
                quote_listeners: ObserverRegistry::new("stream_quotes"),
                connection_listeners: ObserverRegistry::new("stream_status"),
            }),
        }
    }

    /// Symbols subscribed on the current connection, sorted.
    #[must_use]
    pub fn subscribed_symbols(&self) -> Vec<String> {
        self.inner.subscriptions.lock().to_vec()
    }

    /// Authentication progress on the current connection.
    #[must_use]
    pub fn auth_state(&self) -> AuthState {
        self.inner.auth.read().clone()
    }

    /// Reconnect attempts since the last successful open.
    #[must_use]
    pub fn reconnect_attempts(&self) -> u32 {
        self.inner.policy.lock().attempt_count()
    }

    /// Open the connection, optionally bound to the generation a reconnect
    /// timer was scheduled in.
    async fn connect_inner(&self, expected_generation: Option<u64>) -> bool {
        let inner = &self.inner;
        let _guard = inner.connect_lock.lock().await;

        if self.is_connected() {
            return true;
        }

        let generation = inner.generation.load(Ordering::SeqCst);
        match expected_generation {
            Some(expected) if expected != generation => return false,
            Some(_) => {}
            None => {
                // explicit connect supersedes any pending reconnect timer
                if let Some(timer) = inner.reconnect_timer.lock().take() {
                    timer.cancel();
                }
                inner.intentional_close.store(false, Ordering::SeqCst);
            }
        }

        let Some(credential) = inner.credential.read().clone() else {
            tracing::warn!("No session token available, not connecting");
            return false;
        };

        tracing::info!(url = %inner.config.url, "Connecting to quote stream");
        let opened = tokio::time::timeout(
            inner.config.connect_timeout,
            tokio_tungstenite::connect_async(inner.config.url.as_str()),
        )
        .await;

        let mut ws = match opened {
            Ok(Ok((ws, _response))) => ws,
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "Quote stream connection failed");
                return false;
            }
            Err(_) => {
                tracing::warn!(
                    timeout_secs = inner.config.connect_timeout.as_secs(),
                    "Quote stream connection timed out"
                );
                return false;
            }
        };

        if inner.generation.load(Ordering::SeqCst) != generation
            || inner.intentional_close.load(Ordering::SeqCst)
        {
            tracing::debug!("Disconnected while connecting, closing new socket");
            let _ = ws.close(None).await;
            return false;
        }

        let login = match credential.login_frame().to_json() {
            Ok(json) => json,
            Err(e) => {
                tracing::error!(error = %e, "Failed to serialize login frame");
                let _ = ws.close(None).await;
                return false;
            }
        };

        let (outbound, outbound_rx) = mpsc::unbounded_channel();
        let _ = outbound.send(Message::Text(login.into()));
        let cancel = CancellationToken::new();

        inner.policy.lock().reset();
        *inner.auth.write() = AuthState::Authenticating;
        {
            // symbols kept across an unintentional close go out right after login
            let subscriptions = inner.subscriptions.lock();
            let kept = subscriptions.to_vec();
            for symbol in &kept {
                match OutboundFrame::subscribe(credential.token(), symbol).to_json() {
                    Ok(json) => {
                        let _ = outbound.send(Message::Text(json.into()));
                    }
                    Err(e) => {
                        tracing::error!(symbol = %symbol, error = %e, "Failed to serialize subscribe frame");
                    }
                }
            }
            if !kept.is_empty() {
                tracing::info!(count = kept.len(), "Restoring quote subscriptions");
            }
            *inner.session.lock() = Some(Session {
                outbound,
                cancel: cancel.clone(),
                generation,
            });
        }

        tokio::spawn(Self::run_session(
            Arc::clone(inner),
            ws,
            outbound_rx,
            cancel,
            generation,
        ));

        metrics::set_streaming_connected(true);
        tracing::info!("Quote stream connected");
        inner.connection_listeners.notify(&ConnectionEvent::Connected);
        true
    }

    /// Own the socket until cancelled or closed.
    async fn run_session(
        inner: Arc<Inner>,
        ws: WsStream,
        mut outbound_rx: mpsc::UnboundedReceiver<Message>,
        cancel: CancellationToken,
        generation: u64,
    ) {
        let (mut write, mut read) = ws.split();

        let activity = Arc::new(ActivityState::new());
        let (keepalive_tx, mut keepalive_rx) = mpsc::channel::<KeepAliveEvent>(4);
        let keepalive_cancel = cancel.child_token();
        tokio::spawn(
            KeepAliveManager::new(
                inner.config.keepalive.clone(),
                Arc::clone(&activity),
                keepalive_tx,
                keepalive_cancel.clone(),
            )
            .run(),
        );

        let end = loop {
            tokio::select! {
                () = cancel.cancelled() => {
                    let _ = write.send(Message::Close(None)).await;
                    break SessionEnd::Cancelled;
                }
                Some(message) = outbound_rx.recv() => {
                    if let Err(e) = write.send(message).await {
                        break SessionEnd::Error(e.to_string());
                    }
                }
                Some(event) = keepalive_rx.recv() => match event {
                    KeepAliveEvent::SendKeepAlive => {
                        let token = inner.credential.read().clone();
                        if let Some(token) = token
                            && let Ok(json) = OutboundFrame::keepalive(token.token()).to_json()
                            && let Err(e) = write.send(Message::Text(json.into())).await
                        {
                            break SessionEnd::Error(e.to_string());
                        }
                    }
                    KeepAliveEvent::IdleTimeout => break SessionEnd::IdleTimeout,
                },
                frame = read.next() => match frame {
                    Some(Ok(Message::Text(text))) => {
                        activity.record_inbound();
                        if let Some(end) = inner.handle_text(text.as_str()) {
                            break end;
                        }
                    }
                    Some(Ok(Message::Ping(data))) => {
                        activity.record_inbound();
                        if let Err(e) = write.send(Message::Pong(data)).await {
                            break SessionEnd::Error(e.to_string());
                        }
                    }
                    Some(Ok(Message::Close(frame))) => {
                        tracing::info!(frame = ?frame, "Server closed quote stream");
                        break SessionEnd::ClosedByServer;
                    }
                    Some(Ok(_)) => activity.record_inbound(),
                    Some(Err(e)) => break SessionEnd::Error(e.to_string()),
                    None => break SessionEnd::ClosedByServer,
                },
            }
        };

        keepalive_cancel.cancel();
        inner.on_session_end(generation, end);
    }
}

impl Inner {
    /// Decode and dispatch one text frame. Returns `Some` to end the session.
    fn handle_text(&self, text: &str) -> Option<SessionEnd> {
        metrics::record_frame_received();

        let messages = match self.codec.decode(text) {
            Ok(messages) => messages,
            Err(e) => {
                tracing::warn!(error = %e, "Dropping malformed stream frame");
                metrics::record_frame_dropped("malformed");
                return None;
            }
        };

        for message in messages {
            match message {
                StreamMessage::Quote(quote) => {
                    metrics::record_quotes_delivered(Transport::Streaming, 1);
                    self.quote_listeners.notify(&quote);
                }
                StreamMessage::LoginAccepted => {
                    tracing::info!("Quote stream authenticated");
                    *self.auth.write() = AuthState::Authenticated;
                }
                StreamMessage::LoginRejected { code, message } => {
                    tracing::error!(code, message = %message, "Quote stream login rejected");
                    *self.auth.write() = AuthState::Rejected {
                        code,
                        message: message.clone(),
                    };
                    return Some(SessionEnd::AuthRejected(message));
                }
                StreamMessage::Admin { command } => {
                    tracing::trace!(command = %command, "Admin frame");
                }
                StreamMessage::Dropped { reason } => {
                    tracing::warn!(reason = %reason, "Dropping malformed quote entry");
                    metrics::record_frame_dropped("entry");
                }
                StreamMessage::Ignored => {
                    tracing::trace!("Ignoring unhandled frame");
                }
            }
        }
        None
    }

    fn on_session_end(self: &Arc<Self>, generation: u64, end: SessionEnd) {
        let was_current = {
            let mut session = self.session.lock();
            if session.as_ref().is_some_and(|s| s.generation == generation) {
                *session = None;
                true
            } else {
                false
            }
        };
        if !was_current {
            // disconnect() already cleaned up and notified
            return;
        }

        metrics::set_streaming_connected(false);
        if !self.auth.read().is_rejected() {
            *self.auth.write() = AuthState::Disconnected;
        }

        match end {
            SessionEnd::Cancelled => {
                self.connection_listeners.notify(&ConnectionEvent::Disconnected);
            }
            SessionEnd::AuthRejected(message) => {
                self.connection_listeners.notify(&ConnectionEvent::Disconnected);
                self.connection_listeners
                    .notify(&ConnectionEvent::Failed(StreamFailure::AuthRejected(message)));
            }
            other => {
                tracing::warn!(reason = ?other, "Quote stream disconnected");
                self.connection_listeners.notify(&ConnectionEvent::Disconnected);
                if !self.intentional_close.load(Ordering::SeqCst)
                    && self.credential.read().is_some()
                {
                    self.schedule_reconnect();
                }
            }
        }
    }

    /// Arm the reconnect timer, or report exhaustion.
    fn schedule_reconnect(self: &Arc<Self>) {
        let (delay, attempt, max_attempts) = {
            let mut policy = self.policy.lock();
            let delay = policy.next_delay();
            (delay, policy.attempt_count(), policy.max_attempts())
        };

        let Some(delay) = delay else {
            tracing::warn!(max_attempts, "Max reconnection attempts reached");
            self.connection_listeners
                .notify(&ConnectionEvent::Failed(StreamFailure::MaxReconnectAttempts));
            return;
        };

        metrics::record_reconnect_attempt();
        tracing::info!(
            attempt,
            max_attempts,
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            "Scheduling quote stream reconnect"
        );

        let timer = CancellationToken::new();
        if let Some(previous) = self.reconnect_timer.lock().replace(timer.clone()) {
            previous.cancel();
        }
        let generation = self.generation.load(Ordering::SeqCst);

        self.connection_listeners
            .notify(&ConnectionEvent::Reconnecting { attempt, delay });

        let client = StreamingClient {
            inner: Arc::clone(self),
        };
        tokio::spawn(async move {
            tokio::select! {
                () = timer.cancelled() => return,
                () = tokio::time::sleep(delay) => {}
            }
            // a replaced timer is always cancelled, so the slot still holds ours
            if timer.is_cancelled() {
                return;
            }
            client.inner.reconnect_timer.lock().take();
            if client.inner.intentional_close.load(Ordering::SeqCst) {
                return;
            }

            if !client.connect_inner(Some(generation)).await
                && !client.inner.intentional_close.load(Ordering::SeqCst)
                && client.inner.generation.load(Ordering::SeqCst) == generation
            {
                client.inner.schedule_reconnect();
            }
        });
    }

    /// Queue a frame on the live session.
    fn send_frame(&self, frame: &OutboundFrame) -> Result<(), StreamingError> {
        let json = frame
            .to_json()
            .map_err(|e| StreamingError::Send(e.to_string()))?;
        let session = self.session.lock();
        let session = session.as_ref().ok_or(StreamingError::NotConnected)?;
        session
            .outbound
            .send(Message::Text(json.into()))
            .map_err(|_| StreamingError::NotConnected)
    }
}

#[async_trait]
impl QuoteStreamPort for StreamingClient {
    fn set_credential(&self, credential: Option<String>) {
        *self.inner.credential.write() = credential.and_then(SessionCredential::new);
    }

    async fn connect(&self) -> bool {
        self.connect_inner(None).await
    }

    async fn subscribe_to_symbols(
        &self,
        symbols: &[String],
    ) -> Result<SubscriptionChanges, StreamingError> {
        let inner = &self.inner;
        let generation = inner.generation.load(Ordering::SeqCst);
        let token = inner
            .credential
            .read()
            .as_ref()
            .map(|c| c.token().to_string());

        // opening restores the kept set, so diff against what the live
        // connection actually carries
        let needs_open = !self.is_connected()
            && !inner.subscriptions.lock().diff(symbols).subscribe.is_empty();
        if needs_open {
            if token.is_none() {
                return Err(StreamingError::MissingCredential);
            }
            if !self.connect_inner(None).await {
                return Err(StreamingError::NotConnected);
            }
            if inner.generation.load(Ordering::SeqCst) != generation {
                return Err(StreamingError::Closed);
            }
        }
        let changes = inner.subscriptions.lock().diff(symbols);

        for symbol in &changes.unsubscribe {
            if let Some(token) = &token
                && self.is_connected()
            {
                inner.send_frame(&OutboundFrame::unsubscribe(token, symbol))?;
            }
            inner.subscriptions.lock().remove(symbol);
        }

        if !changes.subscribe.is_empty() {
            let token = token.ok_or(StreamingError::MissingCredential)?;
            for symbol in &changes.subscribe {
                inner.send_frame(&OutboundFrame::subscribe(&token, symbol))?;
                inner.subscriptions.lock().insert(symbol.clone());
            }
        }

        let count = inner.subscriptions.lock().len();
        metrics::set_active_subscriptions(count);
        tracing::debug!(
            subscribed = changes.subscribe.len(),
            unsubscribed = changes.unsubscribe.len(),
            total = count,
            "Quote subscriptions updated"
        );
        Ok(changes)
    }

    fn disconnect(&self) {
        let inner = &self.inner;
        inner.intentional_close.store(true, Ordering::SeqCst);
        inner.generation.fetch_add(1, Ordering::SeqCst);

        if let Some(timer) = inner.reconnect_timer.lock().take() {
            timer.cancel();
        }
        let session = inner.session.lock().take();
        if let Some(session) = session {
            session.cancel.cancel();
            tracing::info!("Quote stream disconnected");
        }

        inner.subscriptions.lock().clear();
        inner.policy.lock().reset();
        *inner.auth.write() = AuthState::Disconnected;
        metrics::set_streaming_connected(false);
        metrics::set_active_subscriptions(0);

        inner
            .connection_listeners
            .notify(&ConnectionEvent::Disconnected);
    }

    fn on_quote_update(&self, listener: QuoteListener) -> ListenerHandle {
        self.inner.quote_listeners.register(listener)
    }

    fn on_connection_event(&self, listener: ConnectionListener) -> ListenerHandle {
        self.inner.connection_listeners.register(listener)
    }

    fn is_connected(&self) -> bool {
        self.inner.session.lock().is_some()
    }
}

impl std::fmt::Debug for StreamingClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamingClient")
            .field("url", &self.inner.config.url)
            .field("connected", &self.is_connected())
            .field("subscriptions", &self.inner.subscriptions.lock().len())
            .finish_non_exhaustive()
    }
}
