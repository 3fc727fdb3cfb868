//! Configuration Module
//!
//! Configuration loading for the quote client.

mod settings;

pub use settings::{ApiSettings, ClientConfig, ConfigError, PollingSettings, StreamingSettings};
