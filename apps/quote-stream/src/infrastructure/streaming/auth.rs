//! Streaming Authentication
//!
//! The streaming server expects a login frame carrying the session token as
//! the first frame on every new connection.
//!
//! # Authentication Flow
//!
//! 1. Connect to the WebSocket endpoint
//! 2. Send `auth/ADMIN/LOGIN` with `{token, version, qoslevel}`
//! 3. Optionally receive an `ADMIN/LOGIN` response; a non-zero
//!    `content.code` means the token was rejected
//!
//! A rejected token is terminal: the client stops reconnecting until a new
//! credential is supplied.

use super::messages::OutboundFrame;

// =============================================================================
// Credential
// =============================================================================

/// Opaque session token used to authenticate the stream.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionCredential(String);

impl SessionCredential {
    /// Wrap a token. Returns `None` for a blank token.
    #[must_use]
    pub fn new(token: impl Into<String>) -> Option<Self> {
        let token = token.into();
        if token.trim().is_empty() {
            None
        } else {
            Some(Self(token))
        }
    }

    /// Raw token.
    #[must_use]
    pub fn token(&self) -> &str {
        &self.0
    }

    /// Login frame for this credential.
    #[must_use]
    pub fn login_frame(&self) -> OutboundFrame {
        OutboundFrame::login(&self.0)
    }
}

impl std::fmt::Debug for SessionCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SessionCredential([REDACTED])")
    }
}

// =============================================================================
// Authentication State
// =============================================================================

/// Authentication progress on the current connection.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum AuthState {
    /// No connection.
    #[default]
    Disconnected,

    /// Login sent, no verdict yet.
    Authenticating,

    /// The server accepted the login.
    Authenticated,

    /// The server rejected the login.
    Rejected {
        /// Server status code.
        code: i64,
        /// Server message.
        message: String,
    },
}

impl AuthState {
    /// Check if the login was accepted.
    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated)
    }

    /// Check if the login was rejected.
    #[must_use]
    pub const fn is_rejected(&self) -> bool {
        matches!(self, Self::Rejected { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_credential_is_rejected() {
        assert!(SessionCredential::new("").is_none());
        assert!(SessionCredential::new("   ").is_none());
        assert_eq!(SessionCredential::new("abc").unwrap().token(), "abc");
    }

    #[test]
    fn debug_redacts_token() {
        let credential = SessionCredential::new("secret-token").unwrap();
        let debug = format!("{credential:?}");
        assert!(!debug.contains("secret-token"));
        assert!(debug.contains("REDACTED"));
    }

    #[test]
    fn login_frame_uses_token() {
        let frame = SessionCredential::new("tok").unwrap().login_frame();
        assert_eq!(frame.action, "auth");
        assert_eq!(frame.account, "tok");
    }

    #[test]
    fn auth_state_predicates() {
        assert!(!AuthState::default().is_authenticated());
        assert!(AuthState::Authenticated.is_authenticated());
        assert!(
            AuthState::Rejected {
                code: 1,
                message: "no".into()
            }
            .is_rejected()
        );
    }
}
