//! Session Holder
//!
//! Holds the single opaque session token and publishes authentication
//! changes on a watch channel.

use parking_lot::RwLock;
use tokio::sync::watch;

use crate::application::ports::CredentialSource;

/// In-memory session token store.
pub struct SessionStore {
    token: RwLock<Option<String>>,
    authenticated: watch::Sender<bool>,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStore {
    /// Create an unauthenticated store.
    #[must_use]
    pub fn new() -> Self {
        let (authenticated, _) = watch::channel(false);
        Self {
            token: RwLock::new(None),
            authenticated,
        }
    }

    /// Create a store holding `token`.
    #[must_use]
    pub fn with_token(token: impl Into<String>) -> Self {
        let store = Self::new();
        store.set_token(token);
        store
    }

    /// Store a token. A blank token logs the session out.
    pub fn set_token(&self, token: impl Into<String>) {
        let token = token.into();
        if token.trim().is_empty() {
            self.invalidate();
            return;
        }
        *self.token.write() = Some(token);
        self.authenticated.send_replace(true);
    }

    /// Current token.
    #[must_use]
    pub fn token(&self) -> Option<String> {
        self.token.read().clone()
    }

    /// Whether a token is held.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.token.read().is_some()
    }

    /// Receiver that observes authentication changes.
    #[must_use]
    pub fn watch_authenticated(&self) -> watch::Receiver<bool> {
        self.authenticated.subscribe()
    }

    /// Forget the token.
    pub fn invalidate(&self) {
        let had_token = self.token.write().take().is_some();
        if had_token {
            tracing::info!("Session invalidated");
        }
        self.authenticated.send_replace(false);
    }
}

impl CredentialSource for SessionStore {
    fn credential(&self) -> Option<String> {
        self.token()
    }

    fn invalidate(&self) {
        Self::invalidate(self);
    }
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore")
            .field("token", &self.token.read().as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}
