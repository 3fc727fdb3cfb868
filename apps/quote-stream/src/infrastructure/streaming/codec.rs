//! Stream Codec Module
//!
//! Decodes inbound WebSocket text frames into [`StreamMessage`]s.
//!
//! # Accepted Shapes
//!
//! A text frame may hold a single frame object, an array of frame objects,
//! or an object wrapping frame objects in `data`, `response` or `notify`
//! arrays. Quote frames (`service: "QUOTE"`) carry `content`, an array of
//! per-symbol entries:
//!
//! ```json
//! {"service":"QUOTE","command":"SUBS","content":[
//!   {"key":"AAPL","1":150.20,"2":150.25,"3":150.22,"7":1.10,"8":0.74}
//! ]}
//! ```
//!
//! Entry fields are read by position (`1` bid, `2` ask, `3` last, `7` change,
//! `8` change percent) and then by name (`BID_PRICE`, `ASK_PRICE`,
//! `LAST_PRICE`, `NET_CHANGE`, `NET_CHANGE_PERCENT`, `TRADING_HALTED`).
//! An entry may also be a plain array with the symbol at index 0. Values are
//! numbers or numeric strings; missing values read as zero.
//!
//! A bad entry becomes [`StreamMessage::Dropped`] without affecting the
//! other entries of the same frame.

use std::str::FromStr;

use chrono::Utc;
use rust_decimal::Decimal;
use serde_json::{Map, Value};

use super::messages::{LoginResponse, command, service};
use crate::domain::quote::{Quote, normalize_symbol};

/// Keys that wrap a batch of frames.
const WRAPPER_KEYS: [&str; 3] = ["data", "response", "notify"];

/// Codec errors.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// JSON decoding failed.
    #[error("JSON codec error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid message format.
    #[error("invalid message format: {0}")]
    InvalidFormat(String),
}

/// A decoded inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamMessage {
    /// A quote snapshot.
    Quote(Quote),
    /// The server accepted the login.
    LoginAccepted,
    /// The server rejected the login.
    LoginRejected {
        /// Server status code.
        code: i64,
        /// Server message.
        message: String,
    },
    /// Any other admin frame, such as a keep-alive echo.
    Admin {
        /// Admin command.
        command: String,
    },
    /// A quote entry that could not be decoded.
    Dropped {
        /// Why the entry was dropped.
        reason: String,
    },
    /// A frame for a service this client does not handle.
    Ignored,
}

/// JSON codec for the quote stream.
#[derive(Debug, Default, Clone)]
pub struct JsonCodec;

impl JsonCodec {
    /// Create a new JSON codec.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Decode one text frame into messages, in frame order.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not JSON or is not an object or array.
    pub fn decode(&self, text: &str) -> Result<Vec<StreamMessage>, CodecError> {
        let value: Value = serde_json::from_str(text.trim())?;
        let mut out = Vec::new();
        match value {
            Value::Array(frames) => {
                for frame in frames {
                    self.decode_value(frame, &mut out);
                }
            }
            Value::Object(_) => self.decode_value(value, &mut out),
            other => {
                return Err(CodecError::InvalidFormat(format!(
                    "expected object or array, got {}",
                    json_kind(&other)
                )));
            }
        }
        Ok(out)
    }

    fn decode_value(&self, value: Value, out: &mut Vec<StreamMessage>) {
        let Value::Object(mut object) = value else {
            out.push(StreamMessage::Dropped {
                reason: "frame is not an object".to_string(),
            });
            return;
        };

        let mut wrapped = false;
        for key in WRAPPER_KEYS {
            if let Some(Value::Array(inner)) = object.remove(key) {
                wrapped = true;
                for frame in inner {
                    self.decode_value(frame, out);
                }
            }
        }
        if wrapped && !object.contains_key("service") {
            return;
        }

        Self::decode_frame(&object, out);
    }

    fn decode_frame(frame: &Map<String, Value>, out: &mut Vec<StreamMessage>) {
        let svc = frame.get("service").and_then(Value::as_str).unwrap_or("");
        let cmd = frame.get("command").and_then(Value::as_str).unwrap_or("");

        match svc {
            service::QUOTE => {
                let Some(content) = frame.get("content") else {
                    out.push(StreamMessage::Ignored);
                    return;
                };
                match content {
                    Value::Array(entries) => {
                        out.extend(entries.iter().map(|entry| match parse_quote_entry(entry) {
                            Ok(quote) => StreamMessage::Quote(quote),
                            Err(reason) => StreamMessage::Dropped { reason },
                        }));
                    }
                    entry @ Value::Object(_) => out.push(match parse_quote_entry(entry) {
                        Ok(quote) => StreamMessage::Quote(quote),
                        Err(reason) => StreamMessage::Dropped { reason },
                    }),
                    _ => out.push(StreamMessage::Dropped {
                        reason: "quote content is not an array".to_string(),
                    }),
                }
            }
            service::ADMIN if cmd == command::LOGIN => {
                let response = frame
                    .get("content")
                    .cloned()
                    .map(serde_json::from_value::<LoginResponse>);
                match response {
                    Some(Ok(response)) if !response.is_success() => {
                        out.push(StreamMessage::LoginRejected {
                            code: response.code,
                            message: response
                                .message
                                .unwrap_or_else(|| "login rejected".to_string()),
                        });
                    }
                    _ => out.push(StreamMessage::LoginAccepted),
                }
            }
            service::ADMIN => out.push(StreamMessage::Admin {
                command: cmd.to_string(),
            }),
            _ => out.push(StreamMessage::Ignored),
        }
    }
}

/// Map one content entry to a quote.
fn parse_quote_entry(entry: &Value) -> Result<Quote, String> {
    let raw_symbol = match entry {
        Value::Object(map) => map.get("key").or_else(|| map.get("0")),
        Value::Array(items) => items.first(),
        _ => return Err("quote entry is not an object or array".to_string()),
    };
    let symbol = raw_symbol
        .and_then(Value::as_str)
        .and_then(normalize_symbol)
        .ok_or_else(|| "quote entry has no symbol key".to_string())?;

    let price = |index: usize, name: &str| -> Result<Decimal, String> {
        entry_field(entry, index, name).map_or(Ok(Decimal::ZERO), |v| {
            parse_decimal(v).ok_or_else(|| format!("{symbol}: invalid {name} value {v}"))
        })
    };

    Ok(Quote {
        bid: price(1, "BID_PRICE")?,
        ask: price(2, "ASK_PRICE")?,
        last: price(3, "LAST_PRICE")?,
        change: price(7, "NET_CHANGE")?,
        change_percent: price(8, "NET_CHANGE_PERCENT")?,
        trading_halted: match entry {
            Value::Object(map) => map.get("TRADING_HALTED").is_some_and(parse_flag),
            _ => false,
        },
        updated_at: Utc::now(),
        symbol,
    })
}

/// Look up an entry field by position, then by name.
fn entry_field<'a>(entry: &'a Value, index: usize, name: &str) -> Option<&'a Value> {
    match entry {
        Value::Object(map) => map
            .get(&index.to_string())
            .filter(|v| !v.is_null())
            .or_else(|| map.get(name)),
        Value::Array(items) => items.get(index),
        _ => None,
    }
}

/// Parse a JSON number or numeric string.
///
/// `null` and the empty string read as zero.
pub(crate) fn parse_decimal(value: &Value) -> Option<Decimal> {
    match value {
        Value::Null => Some(Decimal::ZERO),
        Value::Number(n) => decimal_from_str(&n.to_string()),
        Value::String(s) if s.trim().is_empty() => Some(Decimal::ZERO),
        Value::String(s) => decimal_from_str(s.trim()),
        _ => None,
    }
}

fn decimal_from_str(s: &str) -> Option<Decimal> {
    Decimal::from_str(s)
        .or_else(|_| Decimal::from_scientific(s))
        .ok()
}

/// Parse a boolean, numeric or string flag.
pub(crate) fn parse_flag(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::String(s) => s.eq_ignore_ascii_case("true"),
        Value::Number(n) => n.as_i64().is_some_and(|n| n != 0),
        _ => false,
    }
}

const fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn quotes(messages: &[StreamMessage]) -> Vec<&Quote> {
        messages
            .iter()
            .filter_map(|m| match m {
                StreamMessage::Quote(q) => Some(q),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn decode_positional_quote() {
        let codec = JsonCodec::new();
        let text = json!({
            "service": "QUOTE",
            "command": "SUBS",
            "content": [{"key": "aapl", "1": 150.20, "2": 150.25, "3": 150.22, "7": 1.1, "8": 0.74}]
        })
        .to_string();

        let messages = codec.decode(&text).unwrap();
        let q = quotes(&messages);
        assert_eq!(q.len(), 1);
        assert_eq!(q[0].symbol, "AAPL");
        assert_eq!(q[0].bid, dec("150.20"));
        assert_eq!(q[0].ask, dec("150.25"));
        assert_eq!(q[0].last, dec("150.22"));
        assert_eq!(q[0].change, dec("1.1"));
        assert_eq!(q[0].change_percent, dec("0.74"));
        assert!(!q[0].trading_halted);
    }

    #[test]
    fn decode_named_fields_and_strings() {
        let codec = JsonCodec::new();
        let text = json!({
            "service": "QUOTE",
            "content": [{
                "key": "MSFT",
                "BID_PRICE": "410.10",
                "ASK_PRICE": "410.20",
                "LAST_PRICE": 410.15,
                "NET_CHANGE": "-2.5",
                "TRADING_HALTED": "true"
            }]
        })
        .to_string();

        let messages = codec.decode(&text).unwrap();
        let q = quotes(&messages);
        assert_eq!(q[0].bid, dec("410.10"));
        assert_eq!(q[0].last, dec("410.15"));
        assert_eq!(q[0].change, dec("-2.5"));
        assert_eq!(q[0].change_percent, Decimal::ZERO);
        assert!(q[0].trading_halted);
    }

    #[test]
    fn decode_array_entry() {
        let codec = JsonCodec::new();
        let text = r#"{"service":"QUOTE","content":[["TSLA",1,2,3,0,0,0,4,5]]}"#;
        let messages = codec.decode(text).unwrap();
        let q = quotes(&messages);
        assert_eq!(q[0].symbol, "TSLA");
        assert_eq!(q[0].ask, dec("2"));
        assert_eq!(q[0].change_percent, dec("5"));
    }

    #[test]
    fn decode_wrapped_and_batched_frames_in_order() {
        let codec = JsonCodec::new();
        let text = json!({
            "data": [
                {"service": "QUOTE", "content": [{"key": "A", "3": 1}, {"key": "B", "3": 2}]},
                {"service": "QUOTE", "content": [{"key": "C", "3": 3}]}
            ]
        })
        .to_string();

        let messages = codec.decode(&text).unwrap();
        let symbols: Vec<_> = quotes(&messages).iter().map(|q| q.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["A", "B", "C"]);
    }

    #[test]
    fn decode_top_level_array() {
        let codec = JsonCodec::new();
        let text = r#"[{"service":"ADMIN","command":"KEEPALIVE"},{"service":"QUOTE","content":[{"key":"X"}]}]"#;
        let messages = codec.decode(text).unwrap();
        assert_eq!(
            messages[0],
            StreamMessage::Admin {
                command: "KEEPALIVE".into()
            }
        );
        assert!(matches!(messages[1], StreamMessage::Quote(_)));
    }

    #[test]
    fn malformed_entry_is_dropped_without_losing_others() {
        let codec = JsonCodec::new();
        let text = json!({
            "service": "QUOTE",
            "content": [{"1": 5}, {"key": "OK", "1": "abc"}, {"key": "GOOD", "1": 7}]
        })
        .to_string();

        let messages = codec.decode(&text).unwrap();
        let dropped = messages
            .iter()
            .filter(|m| matches!(m, StreamMessage::Dropped { .. }))
            .count();
        assert_eq!(dropped, 2);
        assert_eq!(quotes(&messages)[0].symbol, "GOOD");
    }

    #[test]
    fn login_responses() {
        let codec = JsonCodec::new();
        let accepted = codec
            .decode(r#"{"service":"ADMIN","command":"LOGIN","content":{"code":0}}"#)
            .unwrap();
        assert_eq!(accepted, vec![StreamMessage::LoginAccepted]);

        let rejected = codec
            .decode(r#"{"service":"ADMIN","command":"LOGIN","content":{"code":3,"msg":"expired"}}"#)
            .unwrap();
        assert_eq!(
            rejected,
            vec![StreamMessage::LoginRejected {
                code: 3,
                message: "expired".into()
            }]
        );
    }

    #[test]
    fn unknown_service_is_ignored() {
        let codec = JsonCodec::new();
        let messages = codec.decode(r#"{"service":"TIMESALE"}"#).unwrap();
        assert_eq!(messages, vec![StreamMessage::Ignored]);
    }

    #[test]
    fn invalid_json_is_an_error() {
        let codec = JsonCodec::new();
        assert!(matches!(codec.decode("{not json"), Err(CodecError::Json(_))));
        assert!(matches!(
            codec.decode("42"),
            Err(CodecError::InvalidFormat(_))
        ));
    }

    #[test]
    fn parse_decimal_variants() {
        assert_eq!(parse_decimal(&json!(1.5)), Some(dec("1.5")));
        assert_eq!(parse_decimal(&json!("2.25")), Some(dec("2.25")));
        assert_eq!(parse_decimal(&json!("")), Some(Decimal::ZERO));
        assert_eq!(parse_decimal(&Value::Null), Some(Decimal::ZERO));
        assert_eq!(parse_decimal(&json!(1e-7)), Some(dec("0.0000001")));
        assert_eq!(parse_decimal(&json!("n/a")), None);
        assert_eq!(parse_decimal(&json!(true)), None);
    }
}
