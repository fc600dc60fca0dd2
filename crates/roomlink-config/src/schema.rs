//! Configuration sections.
//!
//! This module holds the timing block every session runs with, plus the
//! serde helpers that store durations as integer milliseconds.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// Default time allowed for the authentication operation.
pub const DEFAULT_AUTH_TIMEOUT: Duration = Duration::from_millis(10_000);

/// Default time allowed for a socket to open (and become ready).
pub const DEFAULT_SOCKET_CONNECT_TIMEOUT: Duration = Duration::from_millis(10_000);

/// Default delay between liveness probes.
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_millis(20_000);

/// Default time a probe waits for its pong.
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_millis(2_000);

/// Delay used once a retry count runs past the end of a backoff table.
pub const DEFAULT_BACKOFF_FALLBACK: Duration = Duration::from_millis(5_000);

/// Default connection retry budget.
pub const DEFAULT_MAX_CONN_TRIES: u32 = 5;

/// Default authentication retry budget.
pub const DEFAULT_MAX_AUTH_TRIES: u32 = 3;

/// Default connection backoff table in milliseconds.
pub const DEFAULT_CONNECTION_BACKOFF_MS: [u64; 4] = [1_000, 2_000, 4_000, 8_000];

/// Default authentication backoff table in milliseconds.
pub const DEFAULT_AUTH_BACKOFF_MS: [u64; 3] = [1_000, 2_000, 4_000];

/// Timing and retry policy for a session.
///
/// Every field is optional in files; missing fields keep the built-in
/// defaults.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use roomlink_config::ConnectionConfig;
///
/// let config = ConnectionConfig::new()
///     .heartbeat_interval(Duration::from_secs(5))
///     .max_auth_tries(1);
///
/// assert_eq!(config.heartbeat_interval, Duration::from_secs(5));
/// assert_eq!(config.max_auth_tries, 1);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConnectionConfig {
    /// Time allowed for the authentication operation.
    #[serde(rename = "auth_timeout_ms", with = "millis")]
    pub auth_timeout: Duration,

    /// Time allowed for one socket open attempt, including the wait for
    /// the room-ready message.
    #[serde(rename = "socket_connect_timeout_ms", with = "millis")]
    pub socket_connect_timeout: Duration,

    /// Delay between liveness probes while connected.
    #[serde(rename = "heartbeat_interval_ms", with = "millis")]
    pub heartbeat_interval: Duration,

    /// Time a probe waits for its pong.
    #[serde(rename = "probe_timeout_ms", with = "millis")]
    pub probe_timeout: Duration,

    /// Connection retry delays indexed by retry count.
    #[serde(rename = "connection_backoff_ms", with = "millis_vec")]
    pub connection_backoff: Vec<Duration>,

    /// Authentication retry delays indexed by retry count.
    #[serde(rename = "auth_backoff_ms", with = "millis_vec")]
    pub auth_backoff: Vec<Duration>,

    /// Delay used past the end of either backoff table.
    #[serde(rename = "backoff_fallback_ms", with = "millis")]
    pub backoff_fallback: Duration,

    /// Scheduled connection retries allowed before giving up.
    pub max_conn_tries: u32,

    /// Scheduled authentication retries allowed before giving up.
    pub max_auth_tries: u32,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            auth_timeout: DEFAULT_AUTH_TIMEOUT,
            socket_connect_timeout: DEFAULT_SOCKET_CONNECT_TIMEOUT,
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
            connection_backoff: DEFAULT_CONNECTION_BACKOFF_MS
                .iter()
                .copied()
                .map(Duration::from_millis)
                .collect(),
            auth_backoff: DEFAULT_AUTH_BACKOFF_MS
                .iter()
                .copied()
                .map(Duration::from_millis)
                .collect(),
            backoff_fallback: DEFAULT_BACKOFF_FALLBACK,
            max_conn_tries: DEFAULT_MAX_CONN_TRIES,
            max_auth_tries: DEFAULT_MAX_AUTH_TRIES,
        }
    }
}

impl ConnectionConfig {
    /// Create a new default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the authentication timeout.
    pub fn auth_timeout(mut self, timeout: Duration) -> Self {
        self.auth_timeout = timeout;
        self
    }

    /// Set the socket connect timeout.
    pub fn socket_connect_timeout(mut self, timeout: Duration) -> Self {
        self.socket_connect_timeout = timeout;
        self
    }

    /// Set the heartbeat interval.
    pub fn heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval;
        self
    }

    /// Set the probe timeout.
    pub fn probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    /// Set the connection backoff table.
    pub fn connection_backoff(mut self, table: Vec<Duration>) -> Self {
        self.connection_backoff = table;
        self
    }

    /// Set the authentication backoff table.
    pub fn auth_backoff(mut self, table: Vec<Duration>) -> Self {
        self.auth_backoff = table;
        self
    }

    /// Set the fallback backoff delay.
    pub fn backoff_fallback(mut self, delay: Duration) -> Self {
        self.backoff_fallback = delay;
        self
    }

    /// Set the connection retry budget.
    pub fn max_conn_tries(mut self, max: u32) -> Self {
        self.max_conn_tries = max;
        self
    }

    /// Set the authentication retry budget.
    pub fn max_auth_tries(mut self, max: u32) -> Self {
        self.max_auth_tries = max;
        self
    }

    /// Validate the timing block.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let timers = [
            ("connection.auth_timeout_ms", self.auth_timeout),
            (
                "connection.socket_connect_timeout_ms",
                self.socket_connect_timeout,
            ),
            ("connection.heartbeat_interval_ms", self.heartbeat_interval),
            ("connection.probe_timeout_ms", self.probe_timeout),
        ];

        for (field, value) in timers {
            if value.is_zero() {
                return Err(ConfigError::invalid_value(field, "must be greater than zero"));
            }
        }

        Ok(())
    }
}

/// Serde helpers for a [`Duration`] stored as integer milliseconds.
pub mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    /// Serialize a duration as milliseconds.
    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    /// Deserialize milliseconds into a duration.
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

/// Serde helpers for a list of [`Duration`]s stored as milliseconds.
pub mod millis_vec {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Serialize durations as a list of milliseconds.
    pub fn serialize<S: Serializer>(
        values: &[Duration],
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        values
            .iter()
            .map(|d| d.as_millis() as u64)
            .collect::<Vec<_>>()
            .serialize(serializer)
    }

    /// Deserialize a list of milliseconds into durations.
    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Vec<Duration>, D::Error> {
        Vec::<u64>::deserialize(deserializer)
            .map(|v| v.into_iter().map(Duration::from_millis).collect())
    }
}
