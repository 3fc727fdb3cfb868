//! Domain Layer - Core quote types and business rules.
//!
//! This layer contains the quote snapshot types, subscription diffing and
//! display formatting with no I/O. All types here are pure Rust with
//! serialization support.

/// Display formatting for prices, changes and timestamps.
pub mod format;

/// Quote snapshots, the keyed quote set and connection status.
pub mod quote;

/// Subscription set tracking and diffing.
pub mod subscription;
