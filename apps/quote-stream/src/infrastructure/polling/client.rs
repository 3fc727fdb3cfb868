//! Polling Client
//!
//! Interval-driven implementation of `QuotePollerPort`. A poll run fetches
//! the whole symbol batch once immediately, then again on every tick until
//! stopped. Failures are reported and the next tick retries, except for
//! `Unauthorized`, which ends the run.
//!
//! Every run carries a generation number. Results from a run that was
//! stopped or replaced while its fetch was in flight are discarded.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use crate::application::observers::{ListenerHandle, ObserverRegistry};
use crate::application::ports::{PollEvent, PollListener, QuoteFetcherPort, QuotePollerPort};
use crate::infrastructure::metrics::{self, Transport};

/// Default polling period.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

struct PollRun {
    generation: u64,
    cancel: CancellationToken,
    symbols: Vec<String>,
}

struct Inner {
    fetcher: Arc<dyn QuoteFetcherPort>,
    interval: Duration,
    run: Mutex<Option<PollRun>>,
    generation: AtomicU64,
    listeners: ObserverRegistry<PollEvent>,
}

/// Polls a `QuoteFetcherPort` on a fixed interval.
#[derive(Clone)]
pub struct PollingClient {
    inner: Arc<Inner>,
}

impl PollingClient {
    /// Create an idle poller.
    #[must_use]
    pub fn new(fetcher: Arc<dyn QuoteFetcherPort>, interval: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                fetcher,
                interval,
                run: Mutex::new(None),
                generation: AtomicU64::new(0),
                listeners: ObserverRegistry::new("poll_events"),
            }),
        }
    }

    /// Polling period.
    #[must_use]
    pub fn interval(&self) -> Duration {
        self.inner.interval
    }

    /// Symbols of the active run.
    #[must_use]
    pub fn symbols(&self) -> Vec<String> {
        self.inner
            .run
            .lock()
            .as_ref()
            .map(|run| run.symbols.clone())
            .unwrap_or_default()
    }

    async fn run_loop(inner: Arc<Inner>, generation: u64, symbols: Vec<String>, cancel: CancellationToken) {
        let start = tokio::time::Instant::now() + inner.interval;
        let mut interval = tokio::time::interval_at(start, inner.interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                () = cancel.cancelled() => break,
                _ = interval.tick() => {}
            }
            let keep_going = tokio::select! {
                biased;
                () = cancel.cancelled() => false,
                keep = inner.poll_once(generation, &symbols) => keep,
            };
            if !keep_going {
                break;
            }
        }
        tracing::debug!(generation, "Poll loop exited");
    }
}

impl Inner {
    fn is_current(&self, generation: u64) -> bool {
        self.run
            .lock()
            .as_ref()
            .is_some_and(|run| run.generation == generation && !run.cancel.is_cancelled())
    }

    /// Fetch once. Returns `false` when the run should stop.
    async fn poll_once(&self, generation: u64, symbols: &[String]) -> bool {
        if !self.is_current(generation) {
            return false;
        }

        self.listeners.notify(&PollEvent::Fetching);
        let started = Instant::now();
        let result = self.fetcher.fetch_quotes(symbols).await;
        let elapsed = started.elapsed();

        if !self.is_current(generation) {
            tracing::debug!(generation, "Discarding result from stopped poll run");
            return false;
        }

        match result {
            Ok(quotes) => {
                metrics::record_poll("ok", elapsed);
                metrics::record_quotes_delivered(Transport::Polling, quotes.len() as u64);
                tracing::debug!(count = quotes.len(), "Polled quotes");
                self.listeners.notify(&PollEvent::Fetched(quotes));
                true
            }
            Err(e) => {
                metrics::record_poll(e.kind(), elapsed);
                let unauthorized = e.is_unauthorized();
                if unauthorized {
                    tracing::warn!("Quote polling unauthorized, stopping");
                    self.end_run(generation);
                } else {
                    tracing::warn!(error = %e, "Quote poll failed");
                }
                self.listeners.notify(&PollEvent::Failed(e));
                !unauthorized
            }
        }
    }

    fn end_run(&self, generation: u64) {
        let mut run = self.run.lock();
        if run.as_ref().is_some_and(|r| r.generation == generation)
            && let Some(run) = run.take()
        {
            run.cancel.cancel();
        }
    }
}

#[async_trait]
impl QuotePollerPort for PollingClient {
    async fn start_polling(&self, symbols: &[String]) {
        self.stop_polling();
        if symbols.is_empty() {
            return;
        }

        let inner = &self.inner;
        let generation = inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let cancel = CancellationToken::new();
        *inner.run.lock() = Some(PollRun {
            generation,
            cancel: cancel.clone(),
            symbols: symbols.to_vec(),
        });
        tracing::info!(
            symbols = symbols.len(),
            interval_secs = inner.interval.as_secs(),
            "Starting quote polling"
        );

        if !inner.poll_once(generation, symbols).await {
            return;
        }

        tokio::spawn(Self::run_loop(
            Arc::clone(inner),
            generation,
            symbols.to_vec(),
            cancel,
        ));
    }

    fn stop_polling(&self) {
        if let Some(run) = self.inner.run.lock().take() {
            run.cancel.cancel();
            tracing::info!("Quote polling stopped");
        }
    }

    fn on_poll_event(&self, listener: PollListener) -> ListenerHandle {
        self.inner.listeners.register(listener)
    }

    fn is_polling(&self) -> bool {
        self.inner.run.lock().is_some()
    }
}

impl std::fmt::Debug for PollingClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PollingClient")
            .field("interval", &self.inner.interval)
            .field("polling", &self.is_polling())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::FetchError;
    use crate::domain::quote::Quote;
    use std::sync::atomic::AtomicUsize;

    struct CountingFetcher {
        calls: AtomicUsize,
        result: Result<Vec<Quote>, FetchError>,
    }

    #[async_trait]
    impl QuoteFetcherPort for CountingFetcher {
        async fn fetch_quotes(&self, _symbols: &[String]) -> Result<Vec<Quote>, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.result.clone()
        }
    }

    fn poller(result: Result<Vec<Quote>, FetchError>) -> (PollingClient, Arc<CountingFetcher>) {
        let fetcher = Arc::new(CountingFetcher {
            calls: AtomicUsize::new(0),
            result,
        });
        let client = PollingClient::new(fetcher.clone(), Duration::from_millis(40));
        (client, fetcher)
    }

    #[tokio::test]
    async fn fetches_immediately_then_on_interval() {
        let (client, fetcher) = poller(Ok(vec![Quote::empty("AAPL")]));
        client.start_polling(&["AAPL".to_string()]).await;
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
        assert!(client.is_polling());

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert!(fetcher.calls.load(Ordering::SeqCst) >= 3);

        client.stop_polling();
        let calls = fetcher.calls.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), calls);
    }

    #[tokio::test]
    async fn failures_keep_polling() {
        let (client, fetcher) = poller(Err(FetchError::NoQuotes));
        client.start_polling(&["AAPL".to_string()]).await;
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(fetcher.calls.load(Ordering::SeqCst) >= 2);
        assert!(client.is_polling());
        client.stop_polling();
    }

    #[tokio::test]
    async fn unauthorized_stops_polling() {
        let (client, fetcher) = poller(Err(FetchError::Unauthorized));
        client.start_polling(&["AAPL".to_string()]).await;
        assert!(!client.is_polling());
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn stop_is_idempotent() {
        let (client, _) = poller(Ok(Vec::new()));
        client.stop_polling();
        client.stop_polling();
        assert!(!client.is_polling());
    }

    #[tokio::test]
    async fn empty_symbols_do_not_poll() {
        let (client, fetcher) = poller(Ok(Vec::new()));
        client.start_polling(&[]).await;
        assert!(!client.is_polling());
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 0);
    }
}
