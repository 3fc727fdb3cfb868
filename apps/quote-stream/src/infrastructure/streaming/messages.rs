//! Streaming Wire Messages
//!
//! Wire format types for the quote streaming WebSocket.
//!
//! # Outbound Frames
//!
//! Every frame the client sends carries the same envelope:
//!
//! ```json
//! {"action":"subscribe","service":"QUOTE","command":"SUBS",
//!  "account":"<token>","source":"<token>",
//!  "parameters":{"keys":"AAPL","fields":"0,1,...,29"}}
//! ```
//!
//! | Purpose     | action        | service | command     | parameters              |
//! |-------------|---------------|---------|-------------|-------------------------|
//! | Login       | `auth`        | `ADMIN` | `LOGIN`     | `token, version, qoslevel` |
//! | Keep-alive  | `heartbeat`   | `ADMIN` | `KEEPALIVE` | none                    |
//! | Subscribe   | `subscribe`   | `QUOTE` | `SUBS`      | `keys, fields`          |
//! | Unsubscribe | `unsubscribe` | `QUOTE` | `UNSUBS`    | `keys`                  |
//!
//! # Inbound Frames
//!
//! Inbound frames use `service`, `command` and `content`. Quote frames carry a
//! `content` array of per-symbol entries, see [`super::codec`].
//!
//! The field layout has not been verified against the production feed and is
//! kept in this module so it can change in one place.

use serde::{Deserialize, Serialize};

/// Protocol version sent with the login frame.
pub const PROTOCOL_VERSION: &str = "1.0";

/// Quote fields requested on subscribe.
pub const QUOTE_FIELDS: &str =
    "0,1,2,3,4,5,6,7,8,9,10,11,12,13,14,15,16,17,18,19,20,21,22,23,24,25,26,27,28,29";

/// Service names.
pub mod service {
    /// Session administration (login, keep-alive).
    pub const ADMIN: &str = "ADMIN";
    /// Level one quotes.
    pub const QUOTE: &str = "QUOTE";
}

/// Command names.
pub mod command {
    /// Login.
    pub const LOGIN: &str = "LOGIN";
    /// Keep-alive.
    pub const KEEPALIVE: &str = "KEEPALIVE";
    /// Subscribe.
    pub const SUBS: &str = "SUBS";
    /// Unsubscribe.
    pub const UNSUBS: &str = "UNSUBS";
}

// =============================================================================
// Outbound
// =============================================================================

/// Parameters carried by an outbound frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FrameParameters {
    /// Login parameters.
    Login {
        /// Session token.
        token: String,
        /// Protocol version.
        version: String,
        /// Quality of service level.
        qoslevel: u8,
    },
    /// Subscribe parameters.
    Subscribe {
        /// Symbol key.
        keys: String,
        /// Requested field list.
        fields: String,
    },
    /// Unsubscribe parameters.
    Unsubscribe {
        /// Symbol key.
        keys: String,
    },
}

/// A frame sent to the streaming server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundFrame {
    /// Requested action.
    pub action: String,
    /// Target service.
    pub service: String,
    /// Service command.
    pub command: String,
    /// Account identifier (the session token).
    pub account: String,
    /// Request source (the session token).
    pub source: String,
    /// Command parameters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<FrameParameters>,
}

impl OutboundFrame {
    fn envelope(action: &str, service: &str, command: &str, token: &str) -> Self {
        Self {
            action: action.to_string(),
            service: service.to_string(),
            command: command.to_string(),
            account: token.to_string(),
            source: token.to_string(),
            parameters: None,
        }
    }

    /// Login frame carrying the session token.
    #[must_use]
    pub fn login(token: &str) -> Self {
        Self {
            parameters: Some(FrameParameters::Login {
                token: token.to_string(),
                version: PROTOCOL_VERSION.to_string(),
                qoslevel: 0,
            }),
            ..Self::envelope("auth", service::ADMIN, command::LOGIN, token)
        }
    }

    /// Keep-alive frame.
    #[must_use]
    pub fn keepalive(token: &str) -> Self {
        Self::envelope("heartbeat", service::ADMIN, command::KEEPALIVE, token)
    }

    /// Subscribe frame for one symbol.
    #[must_use]
    pub fn subscribe(token: &str, symbol: &str) -> Self {
        Self {
            parameters: Some(FrameParameters::Subscribe {
                keys: symbol.to_uppercase(),
                fields: QUOTE_FIELDS.to_string(),
            }),
            ..Self::envelope("subscribe", service::QUOTE, command::SUBS, token)
        }
    }

    /// Unsubscribe frame for one symbol.
    #[must_use]
    pub fn unsubscribe(token: &str, symbol: &str) -> Self {
        Self {
            parameters: Some(FrameParameters::Unsubscribe {
                keys: symbol.to_uppercase(),
            }),
            ..Self::envelope("unsubscribe", service::QUOTE, command::UNSUBS, token)
        }
    }

    /// Serialize to JSON text.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

// =============================================================================
// Inbound
// =============================================================================

/// Outcome of the login handshake.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoginResponse {
    /// Zero on success.
    #[serde(default)]
    pub code: i64,
    /// Server message.
    #[serde(default, alias = "msg")]
    pub message: Option<String>,
}

impl LoginResponse {
    /// Whether the server accepted the login.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.code == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};

    fn as_value(frame: &OutboundFrame) -> Value {
        serde_json::from_str(&frame.to_json().unwrap()).unwrap()
    }

    #[test]
    fn login_frame_shape() {
        let value = as_value(&OutboundFrame::login("tok"));
        assert_eq!(
            value,
            json!({
                "action": "auth",
                "service": "ADMIN",
                "command": "LOGIN",
                "account": "tok",
                "source": "tok",
                "parameters": {"token": "tok", "version": "1.0", "qoslevel": 0}
            })
        );
    }

    #[test]
    fn keepalive_has_no_parameters() {
        let value = as_value(&OutboundFrame::keepalive("tok"));
        assert_eq!(value["action"], "heartbeat");
        assert_eq!(value["command"], "KEEPALIVE");
        assert!(value.get("parameters").is_none());
    }

    #[test]
    fn subscribe_frame_uppercases_key() {
        let value = as_value(&OutboundFrame::subscribe("tok", "aapl"));
        assert_eq!(value["action"], "subscribe");
        assert_eq!(value["service"], "QUOTE");
        assert_eq!(value["command"], "SUBS");
        assert_eq!(value["parameters"]["keys"], "AAPL");
        assert_eq!(value["parameters"]["fields"], QUOTE_FIELDS);
    }

    #[test]
    fn unsubscribe_frame() {
        let value = as_value(&OutboundFrame::unsubscribe("tok", "msft"));
        assert_eq!(value["command"], "UNSUBS");
        assert_eq!(value["parameters"], json!({"keys": "MSFT"}));
    }

    #[test]
    fn frames_round_trip_through_serde() {
        let frame = OutboundFrame::subscribe("tok", "TSLA");
        let parsed: OutboundFrame = serde_json::from_str(&frame.to_json().unwrap()).unwrap();
        assert_eq!(parsed, frame);
    }

    #[test]
    fn login_response_success() {
        let ok: LoginResponse = serde_json::from_value(json!({"code": 0})).unwrap();
        assert!(ok.is_success());
        let rejected: LoginResponse =
            serde_json::from_value(json!({"code": 3, "msg": "bad token"})).unwrap();
        assert!(!rejected.is_success());
        assert_eq!(rejected.message.as_deref(), Some("bad token"));
    }
}
