//! Client Configuration Settings
//!
//! Configuration types for the quote client, loaded from environment
//! variables or a `.env` style file. Lookup is injectable so callers can
//! supply values without touching the process environment.

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

const DEFAULT_API_URL: &str = "https://api.cert.tastyworks.com";
const DEFAULT_STREAM_URL: &str = "wss://streamer.cert.tastyworks.com";

/// HTTP quote API settings.
#[derive(Debug, Clone)]
pub struct ApiSettings {
    /// Base URL for quote requests.
    pub base_url: String,
    /// Per-request timeout.
    pub request_timeout: Duration,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_URL.to_string(),
            request_timeout: Duration::from_secs(10),
        }
    }
}

/// Streaming connection settings.
#[derive(Debug, Clone)]
pub struct StreamingSettings {
    /// Whether streaming is attempted before polling.
    pub enabled: bool,
    /// WebSocket endpoint.
    pub url: String,
    /// Bound on opening the connection.
    pub connect_timeout: Duration,
    /// Keep-alive interval.
    pub heartbeat_interval: Duration,
    /// Silence after which the connection is dropped (`None` = never).
    pub idle_timeout: Option<Duration>,
    /// Initial reconnection delay.
    pub reconnect_delay_initial: Duration,
    /// Maximum reconnection delay.
    pub reconnect_delay_max: Duration,
    /// Reconnection delay multiplier for exponential backoff.
    pub reconnect_delay_multiplier: f64,
    /// Random spread applied to each delay (0.0 = none).
    pub reconnect_jitter: f64,
    /// Maximum reconnection attempts before giving up (0 = unlimited).
    pub max_reconnect_attempts: u32,
}

impl Default for StreamingSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            url: DEFAULT_STREAM_URL.to_string(),
            connect_timeout: Duration::from_secs(10),
            heartbeat_interval: Duration::from_secs(30),
            idle_timeout: None,
            reconnect_delay_initial: Duration::from_millis(1000),
            reconnect_delay_max: Duration::from_secs(30),
            reconnect_delay_multiplier: 2.0,
            reconnect_jitter: 0.0,
            max_reconnect_attempts: 5,
        }
    }
}

/// Polling settings.
#[derive(Debug, Clone)]
pub struct PollingSettings {
    /// Period between batch fetches.
    pub interval: Duration,
}

impl Default for PollingSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
        }
    }
}

/// Complete client configuration.
#[derive(Clone, Default)]
pub struct ClientConfig {
    /// HTTP API settings.
    pub api: ApiSettings,
    /// Streaming settings.
    pub streaming: StreamingSettings,
    /// Polling settings.
    pub polling: PollingSettings,
    /// Prometheus metrics port (0 = disabled).
    pub metrics_port: u16,
    /// Session token for the binary.
    pub session_token: Option<String>,
    /// Symbols tracked by the binary.
    pub symbols: Vec<String>,
}

impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("api", &self.api)
            .field("streaming", &self.streaming)
            .field("polling", &self.polling)
            .field("metrics_port", &self.metrics_port)
            .field(
                "session_token",
                &self.session_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("symbols", &self.symbols)
            .finish()
    }
}

impl ClientConfig {
    /// Create configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if a URL variable has the wrong scheme.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create configuration from a `.env` style file, falling back to the
    /// process environment for keys the file does not set.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or a URL is invalid.
    pub fn from_dotenv_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let entries = dotenvy::from_path_iter(path)
            .map_err(|e| ConfigError::File(format!("{}: {e}", path.display())))?
            .collect::<Result<HashMap<String, String>, _>>()
            .map_err(|e| ConfigError::File(format!("{}: {e}", path.display())))?;

        Self::from_lookup(|key| {
            entries
                .get(key)
                .cloned()
                .or_else(|| std::env::var(key).ok())
        })
    }

    /// Create configuration from an arbitrary key lookup.
    ///
    /// Unparsable numbers fall back to their defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if a URL variable has the wrong scheme.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Lookup(&lookup);
        let api_defaults = ApiSettings::default();
        let stream_defaults = StreamingSettings::default();

        let api = ApiSettings {
            base_url: env.url("QUOTES_API_URL", &api_defaults.base_url, &["http", "https"])?,
            request_timeout: env.secs("QUOTES_REQUEST_TIMEOUT_SECS", api_defaults.request_timeout),
        };

        let idle_secs = env.parse::<u64>("QUOTES_IDLE_TIMEOUT_SECS").unwrap_or(0);
        let streaming = StreamingSettings {
            enabled: env
                .get("QUOTES_ENABLE_STREAMING")
                .is_none_or(|v| !v.trim().eq_ignore_ascii_case("false")),
            url: env.url("QUOTES_STREAM_URL", &stream_defaults.url, &["ws", "wss"])?,
            connect_timeout: env.secs(
                "QUOTES_CONNECT_TIMEOUT_SECS",
                stream_defaults.connect_timeout,
            ),
            heartbeat_interval: env.secs(
                "QUOTES_HEARTBEAT_INTERVAL_SECS",
                stream_defaults.heartbeat_interval,
            ),
            idle_timeout: (idle_secs > 0).then(|| Duration::from_secs(idle_secs)),
            reconnect_delay_initial: env
                .parse::<u64>("QUOTES_RECONNECT_DELAY_INITIAL_MS")
                .map_or(stream_defaults.reconnect_delay_initial, Duration::from_millis),
            reconnect_delay_max: env.secs(
                "QUOTES_RECONNECT_DELAY_MAX_SECS",
                stream_defaults.reconnect_delay_max,
            ),
            reconnect_delay_multiplier: env
                .parse("QUOTES_RECONNECT_DELAY_MULTIPLIER")
                .filter(|m: &f64| m.is_finite() && *m >= 1.0)
                .unwrap_or(stream_defaults.reconnect_delay_multiplier),
            reconnect_jitter: env
                .parse("QUOTES_RECONNECT_JITTER")
                .filter(|j: &f64| (0.0..=1.0).contains(j))
                .unwrap_or(stream_defaults.reconnect_jitter),
            max_reconnect_attempts: env
                .parse("QUOTES_MAX_RECONNECT_ATTEMPTS")
                .unwrap_or(stream_defaults.max_reconnect_attempts),
        };

        let polling = PollingSettings {
            interval: env
                .secs("QUOTES_POLL_INTERVAL_SECS", PollingSettings::default().interval)
                .max(Duration::from_secs(1)),
        };

        Ok(Self {
            api,
            streaming,
            polling,
            metrics_port: env.parse("QUOTES_METRICS_PORT").unwrap_or(0),
            session_token: env
                .get("QUOTES_SESSION_TOKEN")
                .filter(|t| !t.trim().is_empty()),
            symbols: env
                .get("QUOTES_SYMBOLS")
                .map(|list| {
                    list.split(',')
                        .map(str::trim)
                        .filter(|s| !s.is_empty())
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default(),
        })
    }
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A URL variable has an unsupported scheme.
    #[error("{key} must use one of {expected:?}: {value}")]
    InvalidUrl {
        /// Variable name.
        key: String,
        /// Offending value.
        value: String,
        /// Accepted schemes.
        expected: Vec<String>,
    },
    /// A configuration file could not be read.
    #[error("failed to read configuration file {0}")]
    File(String),
}

struct Lookup<'a, F>(&'a F);

impl<F> Lookup<'_, F>
where
    F: Fn(&str) -> Option<String>,
{
    fn get(&self, key: &str) -> Option<String> {
        (self.0)(key)
    }

    fn parse<T: std::str::FromStr>(&self, key: &str) -> Option<T> {
        self.get(key).and_then(|v| v.trim().parse().ok())
    }

    fn secs(&self, key: &str, default: Duration) -> Duration {
        self.parse::<u64>(key).map_or(default, Duration::from_secs)
    }

    fn url(&self, key: &str, default: &str, schemes: &[&str]) -> Result<String, ConfigError> {
        let Some(value) = self.get(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
        else {
            return Ok(default.to_string());
        };

        let valid = value
            .split_once("://")
            .is_some_and(|(scheme, rest)| {
                !rest.is_empty() && schemes.iter().any(|s| s.eq_ignore_ascii_case(scheme))
            });
        if valid {
            Ok(value.trim_end_matches('/').to_string())
        } else {
            Err(ConfigError::InvalidUrl {
                key: key.to_string(),
                value,
                expected: schemes.iter().map(|s| (*s).to_string()).collect(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn config(pairs: &[(&str, &str)]) -> Result<ClientConfig, ConfigError> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        ClientConfig::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn defaults_when_unset() {
        let config = config(&[]).unwrap();
        assert_eq!(config.api.base_url, DEFAULT_API_URL);
        assert_eq!(config.streaming.url, DEFAULT_STREAM_URL);
        assert!(config.streaming.enabled);
        assert_eq!(config.streaming.max_reconnect_attempts, 5);
        assert_eq!(config.streaming.reconnect_delay_initial, Duration::from_secs(1));
        assert!(config.streaming.idle_timeout.is_none());
        assert_eq!(config.polling.interval, Duration::from_secs(5));
        assert_eq!(config.metrics_port, 0);
        assert!(config.session_token.is_none());
        assert!(config.symbols.is_empty());
    }

    #[test]
    fn streaming_disabled_only_by_false() {
        assert!(!config(&[("QUOTES_ENABLE_STREAMING", "false")]).unwrap().streaming.enabled);
        assert!(!config(&[("QUOTES_ENABLE_STREAMING", "FALSE")]).unwrap().streaming.enabled);
        assert!(config(&[("QUOTES_ENABLE_STREAMING", "0")]).unwrap().streaming.enabled);
        assert!(config(&[("QUOTES_ENABLE_STREAMING", "yes")]).unwrap().streaming.enabled);
    }

    #[test]
    fn unparsable_numbers_use_defaults() {
        let config = config(&[
            ("QUOTES_POLL_INTERVAL_SECS", "soon"),
            ("QUOTES_MAX_RECONNECT_ATTEMPTS", "-1"),
            ("QUOTES_RECONNECT_DELAY_MULTIPLIER", "0.5"),
        ])
        .unwrap();
        assert_eq!(config.polling.interval, Duration::from_secs(5));
        assert_eq!(config.streaming.max_reconnect_attempts, 5);
        assert!((config.streaming.reconnect_delay_multiplier - 2.0).abs() < f64::EPSILON);
    }

    #[test]
    fn overrides_are_applied() {
        let config = config(&[
            ("QUOTES_API_URL", "http://localhost:8080/"),
            ("QUOTES_STREAM_URL", "ws://localhost:9000"),
            ("QUOTES_IDLE_TIMEOUT_SECS", "90"),
            ("QUOTES_RECONNECT_DELAY_INITIAL_MS", "250"),
            ("QUOTES_METRICS_PORT", "9464"),
            ("QUOTES_SESSION_TOKEN", "tok"),
            ("QUOTES_SYMBOLS", "aapl, msft,,SPY "),
        ])
        .unwrap();
        assert_eq!(config.api.base_url, "http://localhost:8080");
        assert_eq!(config.streaming.url, "ws://localhost:9000");
        assert_eq!(config.streaming.idle_timeout, Some(Duration::from_secs(90)));
        assert_eq!(
            config.streaming.reconnect_delay_initial,
            Duration::from_millis(250)
        );
        assert_eq!(config.metrics_port, 9464);
        assert_eq!(config.session_token.as_deref(), Some("tok"));
        assert_eq!(config.symbols, vec!["aapl", "msft", "SPY"]);
    }

    #[test]
    fn wrong_scheme_is_rejected() {
        let err = config(&[("QUOTES_STREAM_URL", "https://streamer")]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidUrl { ref key, .. } if key == "QUOTES_STREAM_URL"));
        assert!(config(&[("QUOTES_API_URL", "ftp://api")]).is_err());
        assert!(config(&[("QUOTES_API_URL", "not a url")]).is_err());
    }

    #[test]
    fn debug_redacts_token() {
        let config = config(&[("QUOTES_SESSION_TOKEN", "secret-token")]).unwrap();
        let debug = format!("{config:?}");
        assert!(!debug.contains("secret-token"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn loads_from_dotenv_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "QUOTES_POLL_INTERVAL_SECS=7").unwrap();
        writeln!(file, "QUOTES_SYMBOLS=AAPL,MSFT").unwrap();
        file.flush().unwrap();

        let config = ClientConfig::from_dotenv_file(file.path()).unwrap();
        assert_eq!(config.polling.interval, Duration::from_secs(7));
        assert_eq!(config.symbols, vec!["AAPL", "MSFT"]);
    }

    #[test]
    fn missing_dotenv_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = ClientConfig::from_dotenv_file(dir.path().join("missing.env")).unwrap_err();
        assert!(matches!(err, ConfigError::File(_)));
    }
}
