//! Credential Port (Driven Port)
//!
//! Interface to the session holder that owns the opaque session token.

/// Port for reading and invalidating the session credential.
pub trait CredentialSource: Send + Sync {
    /// Current session token, if authenticated.
    fn credential(&self) -> Option<String>;

    /// Drop the session after an authentication failure.
    fn invalidate(&self);
}
