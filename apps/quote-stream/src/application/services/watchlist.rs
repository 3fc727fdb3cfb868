//! Watchlist Follower
//!
//! Drives the coordinator from the active watchlist's symbol list.

use std::sync::Arc;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use super::coordinator::QuoteCoordinator;
use crate::application::ports::CredentialSource;
use crate::domain::quote::normalize_symbols;

/// Track whatever `symbols` currently holds until `cancel` fires.
///
/// Tracking restarts only when the normalized symbol list changes. On
/// cancellation, or when the sender is dropped, tracking is stopped.
pub async fn follow_watchlist(
    coordinator: QuoteCoordinator,
    mut symbols: watch::Receiver<Vec<String>>,
    session: Arc<dyn CredentialSource>,
    cancel: CancellationToken,
) {
    let mut current: Option<Vec<String>> = None;

    loop {
        let desired = {
            let raw = symbols.borrow_and_update();
            normalize_symbols(raw.as_slice())
        };

        if current.as_ref() != Some(&desired) {
            tracing::info!(symbols = ?desired, "Watchlist changed");
            tokio::select! {
                () = cancel.cancelled() => break,
                () = coordinator.start_tracking(&desired, session.credential()) => {}
            }
            current = Some(desired);
        }

        tokio::select! {
            () = cancel.cancelled() => break,
            changed = symbols.changed() => {
                if changed.is_err() {
                    tracing::debug!("Watchlist source closed");
                    break;
                }
            }
        }
    }

    coordinator.stop_tracking();
}
