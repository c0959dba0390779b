//! Relay configuration loaded from environment variables.
//!
//! Follows 12-factor style: all settings come from environment variables
//! (or a `.env` file via `dotenvy`). Missing or unparsable optional values
//! fall back to defaults; only a malformed `LISTEN_ADDR` is fatal.

use std::net::SocketAddr;
use std::time::Duration;

use crate::bridge::TopicMapping;
use crate::domain::{SupportedPair, Topic};
use crate::error::RelayError;
use crate::hub::TopicSwitchPolicy;

/// Default outbound queue bound per connection.
pub const DEFAULT_OUTBOUND_QUEUE_CAPACITY: usize = 256;

/// Default keepalive ping period.
pub const DEFAULT_KEEPALIVE_INTERVAL: Duration = Duration::from_secs(20);

/// Per-connection settings shared by every pump pair.
#[derive(Debug, Clone)]
pub struct ConnectionSettings {
    /// Trading pair public topics must reference.
    pub supported_pair: SupportedPair,
    /// Period between outbound pings.
    pub keepalive_interval: Duration,
    /// Bound of each connection's outbound queue.
    pub outbound_queue_capacity: usize,
    /// Close the connection after this long without an inbound frame.
    /// `None` disables the deadline.
    pub read_idle_timeout: Option<Duration>,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            supported_pair: SupportedPair::default(),
            keepalive_interval: DEFAULT_KEEPALIVE_INTERVAL,
            outbound_queue_capacity: DEFAULT_OUTBOUND_QUEUE_CAPACITY,
            read_idle_timeout: None,
        }
    }
}

/// Upstream Redis feed settings. Absent when no feed host is configured.
#[derive(Debug, Clone)]
pub struct FeedSettings {
    /// Connection URL (`redis://` or `rediss://`).
    pub url: String,
    /// Pattern passed to `PSUBSCRIBE`.
    pub channel_pattern: String,
    /// How feed messages map onto hub topics.
    pub topic_mapping: TopicMapping,
    /// Delay between reconnect attempts.
    pub retry_delay: Duration,
}

/// Top-level relay configuration.
///
/// Loaded once at startup via [`RelayConfig::from_env`].
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Socket address to bind the HTTP/WebSocket server to.
    pub listen_addr: SocketAddr,
    /// Settings handed to every connection.
    pub connection: ConnectionSettings,
    /// Capacity of the hub command queue.
    pub hub_queue_capacity: usize,
    /// Whether subscribing to a new topic leaves the previous one.
    pub topic_switch_policy: TopicSwitchPolicy,
    /// Upstream feed, if configured.
    pub feed: Option<FeedSettings>,
}

impl RelayConfig {
    /// Loads configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv().ok()` to optionally load a `.env` file.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::InvalidListenAddr`] if `LISTEN_ADDR` is set but
    /// cannot be parsed, or [`RelayError::Config`] if `FEED_TOPIC` is set to
    /// an empty string.
    pub fn from_env() -> Result<Self, RelayError> {
        dotenvy::dotenv().ok();

        let listen_addr: SocketAddr = std::env::var("LISTEN_ADDR")
            .unwrap_or_else(|_| "0.0.0.0:8080".to_string())
            .parse()?;

        let supported_pair = std::env::var("SUPPORTED_PAIR")
            .map(|p| SupportedPair::new(&p))
            .unwrap_or_default();
        let idle_secs: u64 = parse_env("READ_IDLE_TIMEOUT_SECS", 0);

        let connection = ConnectionSettings {
            supported_pair,
            keepalive_interval: Duration::from_secs(
                parse_env("KEEPALIVE_INTERVAL_SECS", 20_u64).max(1),
            ),
            outbound_queue_capacity: parse_env(
                "OUTBOUND_QUEUE_CAPACITY",
                DEFAULT_OUTBOUND_QUEUE_CAPACITY,
            )
            .max(1),
            read_idle_timeout: (idle_secs > 0).then(|| Duration::from_secs(idle_secs)),
        };

        Ok(Self {
            listen_addr,
            connection,
            hub_queue_capacity: parse_env("HUB_QUEUE_CAPACITY", 1024_usize).max(1),
            topic_switch_policy: parse_env("TOPIC_SWITCH_POLICY", TopicSwitchPolicy::Replace),
            feed: feed_from_env()?,
        })
    }
}

/// Builds the feed settings, or `None` when neither `REDIS_URL` nor
/// `REDIS_HOST` is set.
fn feed_from_env() -> Result<Option<FeedSettings>, RelayError> {
    let url = match std::env::var("REDIS_URL") {
        Ok(url) if !url.is_empty() => url,
        _ => {
            let Some(host) = std::env::var("REDIS_HOST").ok().filter(|h| !h.is_empty()) else {
                return Ok(None);
            };
            let port: u16 = parse_env("REDIS_PORT", 6379);
            let password = std::env::var("REDIS_PASSWORD").ok();
            redis_url(&host, port, password.as_deref(), parse_env_bool("REDIS_TLS", true))
        }
    };

    let topic_mapping = match std::env::var("FEED_TOPIC") {
        Ok(name) => TopicMapping::Fixed(
            Topic::new(name).map_err(|e| RelayError::Config(format!("FEED_TOPIC: {e}")))?,
        ),
        Err(_) => TopicMapping::Channel,
    };

    Ok(Some(FeedSettings {
        url,
        channel_pattern: std::env::var("REDIS_CHANNEL_PATTERN").unwrap_or_else(|_| "*".to_string()),
        topic_mapping,
        retry_delay: Duration::from_secs(parse_env("FEED_RETRY_SECS", 5_u64).max(1)),
    }))
}

/// Formats a Redis connection URL. The password is used verbatim and must
/// be URL-safe; use `REDIS_URL` for anything else.
fn redis_url(host: &str, port: u16, password: Option<&str>, tls: bool) -> String {
    let scheme = if tls { "rediss" } else { "redis" };
    match password.filter(|p| !p.is_empty()) {
        Some(pw) => format!("{scheme}://:{pw}@{host}:{port}/0"),
        None => format!("{scheme}://{host}:{port}/0"),
    }
}

/// Parses an environment variable as `T`, returning `default` on missing
/// or invalid values.
fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Parses an environment variable as a boolean. Accepts `"true"`, `"1"`,
/// `"false"`, `"0"` (case-insensitive). Returns `default` otherwise.
fn parse_env_bool(key: &str, default: bool) -> bool {
    match std::env::var(key).ok().map(|v| v.to_ascii_lowercase()).as_deref() {
        Some("true" | "1") => true,
        Some("false" | "0") => false,
        _ => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redis_url_variants() {
        assert_eq!(
            redis_url("cache.local", 6380, Some("s3cret"), true),
            "rediss://:s3cret@cache.local:6380/0"
        );
        assert_eq!(
            redis_url("localhost", 6379, None, false),
            "redis://localhost:6379/0"
        );
        assert_eq!(
            redis_url("localhost", 6379, Some(""), false),
            "redis://localhost:6379/0"
        );
    }

    #[test]
    fn parse_env_falls_back_on_missing_key() {
        assert_eq!(parse_env("TOPIC_RELAY_TEST_SURELY_UNSET", 42_u32), 42);
        assert!(parse_env_bool("TOPIC_RELAY_TEST_SURELY_UNSET", true));
    }

    #[test]
    fn default_connection_settings() {
        let settings = ConnectionSettings::default();
        assert_eq!(settings.supported_pair.as_str(), "XRPPHP");
        assert_eq!(settings.keepalive_interval, Duration::from_secs(20));
        assert_eq!(settings.outbound_queue_capacity, 256);
        assert!(settings.read_idle_timeout.is_none());
    }
}
