//! Application Layer - Use cases and port definitions.
//!
//! This layer contains the application services and port interfaces
//! that define how the domain interacts with external systems.

/// Listener registries with isolated fan-out.
pub mod observers;

/// Port interfaces for transports and the session holder.
pub mod ports;

/// Application services: quote coordination, session and watchlist wiring.
pub mod services;
