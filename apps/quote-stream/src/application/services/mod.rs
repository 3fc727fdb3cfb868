//! Application Services
//!
//! Services that orchestrate domain logic and coordinate between ports.
//!
//! - `QuoteCoordinator`: Owns quote state and selects the transport
//! - `SessionStore`: Holds the session token
//! - `follow_watchlist`: Keeps tracking in step with the watchlist

mod coordinator;
mod session;
mod watchlist;

pub use coordinator::{CoordinatorConfig, QuoteCoordinator, QuotesState, TransportMode};
pub use session::SessionStore;
pub use watchlist::follow_watchlist;
