//! Keep-Alive Manager
//!
//! Sends periodic keep-alive requests for as long as a streaming session is
//! open and, when configured, flags the session as dead after a stretch with
//! no inbound traffic.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Configuration for keep-alive behavior.
#[derive(Debug, Clone)]
pub struct KeepAliveConfig {
    /// Interval between keep-alive frames.
    pub interval: Duration,
    /// Silence after which the session is considered dead (`None` = never).
    pub idle_timeout: Option<Duration>,
}

impl Default for KeepAliveConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(30),
            idle_timeout: None,
        }
    }
}

impl KeepAliveConfig {
    /// Create a new configuration with custom values.
    #[must_use]
    pub const fn new(interval: Duration, idle_timeout: Option<Duration>) -> Self {
        Self {
            interval,
            idle_timeout,
        }
    }

    /// Create configuration from `StreamingSettings`.
    #[must_use]
    pub const fn from_settings(settings: &crate::StreamingSettings) -> Self {
        Self {
            interval: settings.heartbeat_interval,
            idle_timeout: settings.idle_timeout,
        }
    }
}

/// Events emitted by the keep-alive manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeepAliveEvent {
    /// Time to send a keep-alive frame.
    SendKeepAlive,
    /// Nothing was received within the idle timeout.
    IdleTimeout,
}

/// Inbound activity shared between the reader and the keep-alive manager.
#[derive(Debug)]
pub struct ActivityState {
    last_inbound: RwLock<Instant>,
}

impl Default for ActivityState {
    fn default() -> Self {
        Self::new()
    }
}

impl ActivityState {
    /// Create state stamped now.
    #[must_use]
    pub fn new() -> Self {
        Self {
            last_inbound: RwLock::new(Instant::now()),
        }
    }

    /// Record that a frame arrived.
    pub fn record_inbound(&self) {
        *self.last_inbound.write() = Instant::now();
    }

    /// Time since the last inbound frame.
    #[must_use]
    pub fn idle_for(&self) -> Duration {
        self.last_inbound.read().elapsed()
    }
}

/// Drives keep-alive ticks for one streaming session.
///
/// The first tick fires one full interval after start, so nothing is sent
/// ahead of the login frame.
pub struct KeepAliveManager {
    config: KeepAliveConfig,
    state: Arc<ActivityState>,
    event_tx: mpsc::Sender<KeepAliveEvent>,
    cancel: CancellationToken,
}

impl KeepAliveManager {
    /// Create a new keep-alive manager.
    #[must_use]
    pub const fn new(
        config: KeepAliveConfig,
        state: Arc<ActivityState>,
        event_tx: mpsc::Sender<KeepAliveEvent>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            config,
            state,
            event_tx,
            cancel,
        }
    }

    /// Run until cancelled, the receiver is dropped, or the session idles out.
    pub async fn run(self) {
        let start = tokio::time::Instant::now() + self.config.interval;
        let mut interval = tokio::time::interval_at(start, self.config.interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                () = self.cancel.cancelled() => {
                    tracing::debug!("Keep-alive manager cancelled");
                    break;
                }
                _ = interval.tick() => {
                    if !self.tick().await {
                        break;
                    }
                }
            }
        }
    }

    /// Returns `false` when the loop should exit.
    async fn tick(&self) -> bool {
        if let Some(timeout) = self.config.idle_timeout {
            let idle = self.state.idle_for();
            if idle > timeout {
                tracing::warn!(
                    idle_secs = idle.as_secs(),
                    timeout_secs = timeout.as_secs(),
                    "Streaming session idle timeout"
                );
                let _ = self.event_tx.send(KeepAliveEvent::IdleTimeout).await;
                return false;
            }
        }

        if self.event_tx.send(KeepAliveEvent::SendKeepAlive).await.is_err() {
            tracing::debug!("Event channel closed, stopping keep-alive");
            return false;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_values() {
        let config = KeepAliveConfig::default();
        assert_eq!(config.interval, Duration::from_secs(30));
        assert!(config.idle_timeout.is_none());
    }

    #[test]
    fn activity_resets_idle_time() {
        let state = ActivityState::new();
        *state.last_inbound.write() = Instant::now()
            .checked_sub(Duration::from_secs(5))
            .unwrap();
        assert!(state.idle_for() >= Duration::from_secs(5));
        state.record_inbound();
        assert!(state.idle_for() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn manager_sends_keepalive_after_interval() {
        let config = KeepAliveConfig::new(Duration::from_millis(50), None);
        let (event_tx, mut event_rx) = mpsc::channel(10);
        let cancel = CancellationToken::new();
        let manager =
            KeepAliveManager::new(config, Arc::new(ActivityState::new()), event_tx, cancel.clone());

        let started = Instant::now();
        let handle = tokio::spawn(manager.run());

        let event = tokio::time::timeout(Duration::from_millis(500), event_rx.recv())
            .await
            .expect("should receive event")
            .expect("channel should not close");
        assert_eq!(event, KeepAliveEvent::SendKeepAlive);
        assert!(started.elapsed() >= Duration::from_millis(45));

        cancel.cancel();
        handle.await.expect("task should complete");
    }

    #[tokio::test]
    async fn manager_detects_idle_timeout() {
        let config =
            KeepAliveConfig::new(Duration::from_millis(30), Some(Duration::from_millis(100)));
        let state = Arc::new(ActivityState::new());
        *state.last_inbound.write() = Instant::now()
            .checked_sub(Duration::from_millis(200))
            .unwrap();
        let (event_tx, mut event_rx) = mpsc::channel(10);
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(
            KeepAliveManager::new(config, state, event_tx, cancel.clone()).run(),
        );

        let mut timed_out = false;
        while let Ok(Some(event)) =
            tokio::time::timeout(Duration::from_millis(500), event_rx.recv()).await
        {
            if event == KeepAliveEvent::IdleTimeout {
                timed_out = true;
                break;
            }
        }
        assert!(timed_out, "should receive idle timeout");

        let result = tokio::time::timeout(Duration::from_millis(200), handle).await;
        assert!(result.is_ok(), "manager should exit after idle timeout");
    }

    #[tokio::test]
    async fn manager_cancellation() {
        let config = KeepAliveConfig::new(Duration::from_secs(10), None);
        let (event_tx, _event_rx) = mpsc::channel(10);
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(
            KeepAliveManager::new(config, Arc::new(ActivityState::new()), event_tx, cancel.clone())
                .run(),
        );

        cancel.cancel();

        let result = tokio::time::timeout(Duration::from_millis(100), handle).await;
        assert!(result.is_ok(), "manager should shut down on cancellation");
    }
}
