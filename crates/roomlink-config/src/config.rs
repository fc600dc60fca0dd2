//! Main configuration types.
//!
//! This module provides the top-level [`RoomConfig`] struct and its builder.

use serde::{Deserialize, Serialize};

use roomlink_telemetry::{LogConfig, LogLevel};

use crate::{ConfigError, ConnectionConfig};

/// Host used when none is configured (a local development server).
pub const DEFAULT_HOST: &str = "localhost:1999";

/// Room used when none is configured.
pub const DEFAULT_ROOM: &str = "default";

/// Complete configuration for one session.
///
/// Use [`ConfigLoader`](crate::ConfigLoader) to load it from files and
/// environment variables, or [`RoomConfig::builder`] in code.
///
/// # Example
///
/// ```
/// use roomlink_config::RoomConfig;
///
/// let config = RoomConfig::default();
/// assert_eq!(config.host, "localhost:1999");
/// assert!(config.party.is_none());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct RoomConfig {
    /// Server host, optionally with a scheme prefix that is stripped
    /// when the address is built.
    pub host: String,

    /// Room identifier.
    pub room: String,

    /// Optional party (namespace). Selects `/parties/{party}/{room}`
    /// over `/party/{room}`.
    pub party: Option<String>,

    /// Static user identifier. A fresh one is generated when absent.
    pub user_id: Option<String>,

    /// Explicit URL scheme (`ws` or `wss`), overriding the
    /// localhost-based choice.
    pub protocol: Option<String>,

    /// Whether a socket is only usable once the connection resolver
    /// acknowledges a "room ready" message.
    pub wait_for_room: bool,

    /// Numeric log verbosity.
    pub log_level: LogLevel,

    /// Timing and retry policy.
    pub connection: ConnectionConfig,
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            room: DEFAULT_ROOM.to_string(),
            party: None,
            user_id: None,
            protocol: None,
            wait_for_room: false,
            log_level: LogLevel::default(),
            connection: ConnectionConfig::default(),
        }
    }
}

impl RoomConfig {
    /// Create a new configuration builder.
    ///
    /// # Example
    ///
    /// ```
    /// use roomlink_config::RoomConfig;
    ///
    /// let config = RoomConfig::builder()
    ///     .host("rooms.example.com")
    ///     .room("lobby")
    ///     .party("chat")
    ///     .build();
    ///
    /// assert_eq!(config.room, "lobby");
    /// assert_eq!(config.party.as_deref(), Some("chat"));
    /// ```
    #[must_use]
    pub fn builder() -> RoomConfigBuilder {
        RoomConfigBuilder::new()
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingField` if host or room is empty, and
    /// `ConfigError::InvalidValue` if:
    /// - the protocol override is not `ws` or `wss`
    /// - any timer in the connection block is zero
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.host.trim().is_empty() {
            return Err(ConfigError::missing_field("host"));
        }

        if self.room.trim().is_empty() {
            return Err(ConfigError::missing_field("room"));
        }

        if let Some(protocol) = &self.protocol {
            if protocol != "ws" && protocol != "wss" {
                return Err(ConfigError::invalid_value(
                    "protocol",
                    format!("expected 'ws' or 'wss', got '{protocol}'"),
                ));
            }
        }

        if matches!(&self.user_id, Some(id) if id.is_empty()) {
            return Err(ConfigError::invalid_value("user_id", "must not be empty"));
        }

        self.connection.validate()
    }

    /// Logging setup matching the configured verbosity.
    ///
    /// Pass the result to `roomlink_telemetry::init_logging`.
    #[must_use]
    pub fn log_config(&self) -> LogConfig {
        LogConfig::for_level(self.log_level)
    }

    /// Create a development configuration preset.
    ///
    /// Debug-level logging against the local development host.
    #[must_use]
    pub fn development() -> Self {
        Self {
            log_level: LogLevel::Debug,
            ..Self::default()
        }
    }

    /// Create a production configuration preset.
    ///
    /// Only warnings and failures are logged.
    #[must_use]
    pub fn production() -> Self {
        Self {
            log_level: LogLevel::Warn,
            ..Self::default()
        }
    }
}

/// Builder for [`RoomConfig`].
#[derive(Debug, Default)]
pub struct RoomConfigBuilder {
    config: RoomConfig,
}

impl RoomConfigBuilder {
    /// Create a new builder with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the host.
    #[must_use]
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.config.host = host.into();
        self
    }

    /// Set the room.
    #[must_use]
    pub fn room(mut self, room: impl Into<String>) -> Self {
        self.config.room = room.into();
        self
    }

    /// Set the party.
    #[must_use]
    pub fn party(mut self, party: impl Into<String>) -> Self {
        self.config.party = Some(party.into());
        self
    }

    /// Set a static user identifier.
    #[must_use]
    pub fn user_id(mut self, user_id: impl Into<String>) -> Self {
        self.config.user_id = Some(user_id.into());
        self
    }

    /// Force the URL scheme.
    #[must_use]
    pub fn protocol(mut self, protocol: impl Into<String>) -> Self {
        self.config.protocol = Some(protocol.into());
        self
    }

    /// Require the room-ready acknowledgment before a socket is usable.
    #[must_use]
    pub fn wait_for_room(mut self, wait: bool) -> Self {
        self.config.wait_for_room = wait;
        self
    }

    /// Set the log verbosity.
    #[must_use]
    pub fn log_level(mut self, level: LogLevel) -> Self {
        self.config.log_level = level;
        self
    }

    /// Set the timing and retry policy.
    #[must_use]
    pub fn connection(mut self, connection: ConnectionConfig) -> Self {
        self.config.connection = connection;
        self
    }

    /// Build the configuration.
    #[must_use]
    pub fn build(self) -> RoomConfig {
        self.config
    }

    /// Build and validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if validation fails.
    pub fn build_validated(self) -> Result<RoomConfig, ConfigError> {
        let config = self.build();
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_default_config() {
        let config = RoomConfig::default();
        assert_eq!(config.host, DEFAULT_HOST);
        assert_eq!(config.room, DEFAULT_ROOM);
        assert!(config.user_id.is_none());
        assert!(!config.wait_for_room);
        assert_eq!(config.log_level, LogLevel::Warn);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder_all_fields() {
        let config = RoomConfig::builder()
            .host("https://rooms.example.com")
            .room("lobby")
            .party("chat")
            .user_id("user-1")
            .protocol("wss")
            .wait_for_room(true)
            .log_level(LogLevel::Trace)
            .connection(ConnectionConfig::new().max_conn_tries(1))
            .build();

        assert_eq!(config.host, "https://rooms.example.com");
        assert_eq!(config.room, "lobby");
        assert_eq!(config.party.as_deref(), Some("chat"));
        assert_eq!(config.user_id.as_deref(), Some("user-1"));
        assert_eq!(config.protocol.as_deref(), Some("wss"));
        assert!(config.wait_for_room);
        assert_eq!(config.log_level, LogLevel::Trace);
        assert_eq!(config.connection.max_conn_tries, 1);
    }

    #[test]
    fn test_validate_empty_host() {
        let result = RoomConfig::builder().host("  ").build_validated();
        assert!(matches!(result, Err(ConfigError::MissingField { ref field }) if field == "host"));
    }

    #[test]
    fn test_validate_empty_room() {
        let result = RoomConfig::builder().room("").build_validated();
        assert!(matches!(result, Err(ConfigError::MissingField { ref field }) if field == "room"));
    }

    #[test]
    fn test_validate_bad_protocol() {
        let result = RoomConfig::builder().protocol("http").build_validated();
        assert!(result.unwrap_err().to_string().contains("protocol"));
    }

    #[test]
    fn test_validate_empty_user_id() {
        let result = RoomConfig::builder().user_id("").build_validated();
        assert!(result.unwrap_err().to_string().contains("user_id"));
    }

    #[test]
    fn test_validate_zero_connect_timeout() {
        let result = RoomConfig::builder()
            .connection(ConnectionConfig::new().socket_connect_timeout(Duration::ZERO))
            .build_validated();
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("socket_connect_timeout_ms"));
    }

    #[test]
    fn test_presets() {
        assert_eq!(RoomConfig::development().log_level, LogLevel::Debug);
        assert_eq!(RoomConfig::production().log_level, LogLevel::Warn);
    }

    #[test]
    fn test_log_config_follows_level() {
        let config = RoomConfig::builder().log_level(LogLevel::Info).build();
        assert_eq!(config.log_config().level, "warn,roomlink=info");

        let config = RoomConfig::builder().log_level(LogLevel::Off).build();
        assert!(!config.log_config().enabled);
    }

    #[test]
    fn test_toml_deserialization() {
        let toml_str = r#"
            host = "rooms.example.com"
            room = "lobby"
            log_level = 2

            [connection]
            max_auth_tries = 7
            auth_backoff_ms = [250]
        "#;

        let config: RoomConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.host, "rooms.example.com");
        assert_eq!(config.log_level, LogLevel::Info);
        assert_eq!(config.connection.max_auth_tries, 7);
        assert_eq!(config.connection.auth_backoff, vec![Duration::from_millis(250)]);
        assert_eq!(
            config.connection.heartbeat_interval,
            crate::schema::DEFAULT_HEARTBEAT_INTERVAL
        );
    }

    #[test]
    fn test_unknown_field_rejected() {
        let result: Result<RoomConfig, _> = toml::from_str("hostname = \"x\"");
        assert!(result.is_err());
    }

    #[test]
    fn test_toml_serialization() {
        let toml_str = toml::to_string_pretty(&RoomConfig::default()).unwrap();
        assert!(toml_str.contains("[connection]"));
        assert!(toml_str.contains("heartbeat_interval_ms = 20000"));
    }
}
