//! Port Interfaces
//!
//! Defines the interfaces (ports) for external systems following
//! the Hexagonal Architecture pattern. These are the contracts that
//! infrastructure adapters must implement.
//!
//! ## Driven Ports (Outbound)
//!
//! - `QuoteStreamPort`: Push transport over a persistent connection
//! - `QuoteFetcherPort`: Single batch quote fetch
//! - `QuotePollerPort`: Pull transport re-fetching a batch on an interval
//! - `CredentialSource`: Session holder supplying the bearer token

mod credential_port;
mod quote_fetcher_port;
mod quote_poller_port;
mod quote_stream_port;

pub use credential_port::CredentialSource;
pub use quote_fetcher_port::{FetchError, QuoteFetcherPort};
pub use quote_poller_port::{PollEvent, PollListener, QuotePollerPort};
pub use quote_stream_port::{
    ConnectionEvent, ConnectionListener, QuoteListener, QuoteStreamPort, StreamFailure,
    StreamingError,
};
