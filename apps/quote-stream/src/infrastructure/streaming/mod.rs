//! Quote Streaming Adapter
//!
//! WebSocket client for the quote streamer:
//!
//! - **Client**: Connection lifecycle, subscriptions and reconnects
//! - **Codec**: JSON frame decoding into quotes
//! - **Messages**: Outbound frame construction

pub mod auth;
pub mod client;
pub mod codec;
pub mod heartbeat;
pub mod messages;
pub mod reconnect;

pub use auth::{AuthState, SessionCredential};
pub use client::{StreamingClient, StreamingClientConfig};
pub use codec::{CodecError, JsonCodec, StreamMessage};
pub use heartbeat::{ActivityState, KeepAliveConfig, KeepAliveEvent, KeepAliveManager};
pub use messages::{LoginResponse, OutboundFrame};
pub use reconnect::{ReconnectConfig, ReconnectPolicy};
