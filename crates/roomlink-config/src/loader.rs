//! Configuration loader with layered approach.
//!
//! This module provides the [`ConfigLoader`] for loading configuration from
//! multiple sources: defaults, files, and environment variables.

use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use roomlink_telemetry::LogLevel;

use crate::{ConfigError, RoomConfig};

/// Configuration loader with layered approach.
///
/// The loader applies configuration in layers, with later layers overriding
/// earlier ones:
/// 1. Default values (built into the code)
/// 2. Configuration file (TOML or JSON)
/// 3. Environment variables
///
/// # Example
///
/// ```no_run
/// use roomlink_config::ConfigLoader;
///
/// # fn main() -> Result<(), roomlink_config::ConfigError> {
/// let config = ConfigLoader::new()
///     .with_defaults()
///     .with_file("roomlink.toml")?
///     .with_env_prefix("ROOMLINK")
///     .load()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct ConfigLoader {
    config: RoomConfig,
    env_prefix: Option<String>,
    file_loaded: bool,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    /// Create a new configuration loader.
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: RoomConfig::default(),
            env_prefix: None,
            file_loaded: false,
        }
    }

    /// Start with default configuration values.
    ///
    /// This is called automatically by `new()`, but can be chained for clarity.
    #[must_use]
    pub fn with_defaults(mut self) -> Self {
        self.config = RoomConfig::default();
        self
    }

    /// Start with development preset configuration.
    ///
    /// # Example
    ///
    /// ```
    /// use roomlink_config::ConfigLoader;
    /// use roomlink_telemetry::LogLevel;
    ///
    /// let config = ConfigLoader::new()
    ///     .with_development()
    ///     .load()
    ///     .unwrap();
    ///
    /// assert_eq!(config.log_level, LogLevel::Debug);
    /// ```
    #[must_use]
    pub fn with_development(mut self) -> Self {
        self.config = RoomConfig::development();
        self
    }

    /// Start with production preset configuration.
    #[must_use]
    pub fn with_production(mut self) -> Self {
        self.config = RoomConfig::production();
        self
    }

    /// Load configuration from a file.
    ///
    /// Supports TOML (.toml) and JSON (.json) formats.
    /// The file format is determined by the file extension.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - The file does not exist
    /// - The file cannot be read
    /// - The file contains invalid TOML/JSON
    /// - The file contains unknown fields
    pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigError::file_not_found(path));
        }

        let content = fs::read_to_string(path).map_err(|e| ConfigError::read(path, e))?;

        self.config = Self::parse_file(&content, path)?;
        self.file_loaded = true;

        Ok(self)
    }

    /// Load configuration from an optional file.
    ///
    /// If the file exists, loads it. If not, silently continues.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the file exists but cannot be read or parsed.
    pub fn with_optional_file<P: AsRef<Path>>(self, path: P) -> Result<Self, ConfigError> {
        if path.as_ref().exists() {
            self.with_file(path)
        } else {
            Ok(self)
        }
    }

    /// Load configuration from a string.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if parsing fails or the format is unknown.
    ///
    /// # Example
    ///
    /// ```
    /// use roomlink_config::ConfigLoader;
    ///
    /// let toml = r#"
    ///     host = "rooms.example.com"
    ///     room = "lobby"
    /// "#;
    ///
    /// let config = ConfigLoader::new()
    ///     .with_string(toml, "toml")
    ///     .unwrap()
    ///     .load()
    ///     .unwrap();
    ///
    /// assert_eq!(config.room, "lobby");
    /// ```
    pub fn with_string(mut self, content: &str, format: &str) -> Result<Self, ConfigError> {
        self.config = match format.to_lowercase().as_str() {
            "toml" => toml::from_str(content)?,
            "json" => serde_json::from_str(content)?,
            _ => {
                return Err(ConfigError::unsupported_format(format))
            }
        };
        Ok(self)
    }

    /// Set environment variable prefix for overrides.
    ///
    /// Environment variables use the format `PREFIX__KEY` for top-level
    /// fields and `PREFIX__CONNECTION__KEY` for the timing block.
    /// For example, with prefix "ROOMLINK":
    /// - `ROOMLINK__HOST=rooms.example.com`
    /// - `ROOMLINK__CONNECTION__MAX_CONN_TRIES=10`
    /// - `ROOMLINK__CONNECTION__AUTH_BACKOFF_MS=100,200,400`
    #[must_use]
    pub fn with_env_prefix(mut self, prefix: &str) -> Self {
        self.env_prefix = Some(prefix.to_uppercase());
        self
    }

    /// Load a `.env` file for environment variables.
    ///
    /// Uses the `dotenvy` crate; a missing file is not an error.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the file exists but cannot be parsed.
    pub fn with_dotenv(self) -> Result<Self, ConfigError> {
        match dotenvy::dotenv() {
            Ok(_) => Ok(self),
            Err(e) if e.not_found() => Ok(self),
            Err(e) => Err(ConfigError::DotEnv(e.to_string())),
        }
    }

    /// Whether a configuration file has been loaded.
    pub fn file_loaded(&self) -> bool {
        self.file_loaded
    }

    /// Finalize and return the loaded configuration.
    ///
    /// Applies environment variable overrides (if a prefix was set) and
    /// validates the final configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if an environment variable cannot be parsed
    /// or validation fails.
    pub fn load(mut self) -> Result<RoomConfig, ConfigError> {
        if let Some(prefix) = self.env_prefix.take() {
            let vars: HashMap<String, String> = env::vars()
                .filter(|(k, _)| k.starts_with(&prefix))
                .collect();
            self.apply_env_vars(&prefix, &vars)?;
        }

        self.config.validate()?;

        Ok(self.config)
    }

    /// Finalize without validation.
    #[must_use]
    pub fn load_unvalidated(self) -> RoomConfig {
        self.config
    }

    // Parse configuration file based on extension
    fn parse_file(content: &str, path: &Path) -> Result<RoomConfig, ConfigError> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase);

        match extension.as_deref() {
            Some("toml") => Ok(toml::from_str(content)?),
            Some("json") => Ok(serde_json::from_str(content)?),
            _ => Err(ConfigError::unsupported_format(path.display().to_string())),
        }
    }

    fn apply_env_vars(
        &mut self,
        prefix: &str,
        vars: &HashMap<String, String>,
    ) -> Result<(), ConfigError> {
        for (key, value) in vars {
            self.apply_env_var(key, value, prefix)?;
        }
        Ok(())
    }

    // Apply a single environment variable
    fn apply_env_var(&mut self, key: &str, value: &str, prefix: &str) -> Result<(), ConfigError> {
        let Some(key_without_prefix) = key.strip_prefix(prefix).and_then(|k| k.strip_prefix("__"))
        else {
            // Same prefix, different variable family (e.g. ROOMLINKER_*).
            return Ok(());
        };

        let parts: Vec<&str> = key_without_prefix.split("__").collect();
        let connection = &mut self.config.connection;

        match parts.as_slice() {
            ["HOST"] => self.config.host = value.to_string(),
            ["ROOM"] => self.config.room = value.to_string(),
            ["PARTY"] => self.config.party = non_empty(value),
            ["USER_ID"] => self.config.user_id = non_empty(value),
            ["PROTOCOL"] => self.config.protocol = non_empty(value),
            ["WAIT_FOR_ROOM"] => self.config.wait_for_room = parse_bool(key, value)?,
            ["LOG_LEVEL"] => {
                self.config.log_level = LogLevel::from_str(value)
                    .map_err(|e| ConfigError::env_var(key, e.to_string()))?;
            }
            ["CONNECTION", "AUTH_TIMEOUT_MS"] => connection.auth_timeout = parse_millis(key, value)?,
            ["CONNECTION", "SOCKET_CONNECT_TIMEOUT_MS"] => {
                connection.socket_connect_timeout = parse_millis(key, value)?;
            }
            ["CONNECTION", "HEARTBEAT_INTERVAL_MS"] => {
                connection.heartbeat_interval = parse_millis(key, value)?;
            }
            ["CONNECTION", "PROBE_TIMEOUT_MS"] => {
                connection.probe_timeout = parse_millis(key, value)?;
            }
            ["CONNECTION", "BACKOFF_FALLBACK_MS"] => {
                connection.backoff_fallback = parse_millis(key, value)?;
            }
            ["CONNECTION", "CONNECTION_BACKOFF_MS"] => {
                connection.connection_backoff = parse_millis_list(key, value)?;
            }
            ["CONNECTION", "AUTH_BACKOFF_MS"] => {
                connection.auth_backoff = parse_millis_list(key, value)?;
            }
            ["CONNECTION", "MAX_CONN_TRIES"] => {
                connection.max_conn_tries = value
                    .parse()
                    .map_err(|_| ConfigError::env_var(key, "expected integer"))?;
            }
            ["CONNECTION", "MAX_AUTH_TRIES"] => {
                connection.max_auth_tries = value
                    .parse()
                    .map_err(|_| ConfigError::env_var(key, "expected integer"))?;
            }
            _ => {
                return Err(ConfigError::env_var(key, "unknown configuration key"));
            }
        }

        Ok(())
    }
}

fn non_empty(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::env_var(key, "expected boolean")),
    }
}

fn parse_millis(key: &str, value: &str) -> Result<Duration, ConfigError> {
    value
        .trim()
        .parse()
        .map(Duration::from_millis)
        .map_err(|_| ConfigError::env_var(key, "expected milliseconds"))
}

fn parse_millis_list(key: &str, value: &str) -> Result<Vec<Duration>, ConfigError> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| parse_millis(key, s))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::{Builder, NamedTempFile};

    fn temp_file(suffix: &str) -> NamedTempFile {
        Builder::new().suffix(suffix).tempfile().unwrap()
    }

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn test_load_defaults() {
        let config = ConfigLoader::new().load().unwrap();
        assert_eq!(config, RoomConfig::default());
    }

    #[test]
    fn test_load_toml_file() {
        let mut file = temp_file(".toml");
        writeln!(
            file,
            r#"
            host = "rooms.example.com"
            room = "lobby"
            party = "chat"

            [connection]
            heartbeat_interval_ms = 5000
            "#
        )
        .unwrap();

        let loader = ConfigLoader::new().with_file(file.path()).unwrap();
        assert!(loader.file_loaded());

        let config = loader.load().unwrap();
        assert_eq!(config.host, "rooms.example.com");
        assert_eq!(config.party.as_deref(), Some("chat"));
        assert_eq!(
            config.connection.heartbeat_interval,
            Duration::from_millis(5000)
        );
    }

    #[test]
    fn test_load_json_file() {
        let mut file = temp_file(".json");
        writeln!(
            file,
            r#"{{"room": "lobby", "wait_for_room": true, "connection": {{"max_conn_tries": 2}}}}"#
        )
        .unwrap();

        let config = ConfigLoader::new()
            .with_file(file.path())
            .unwrap()
            .load()
            .unwrap();
        assert_eq!(config.room, "lobby");
        assert!(config.wait_for_room);
        assert_eq!(config.connection.max_conn_tries, 2);
    }

    #[test]
    fn test_missing_file() {
        let result = ConfigLoader::new().with_file("/nonexistent/roomlink.toml");
        assert!(matches!(result, Err(ConfigError::FileNotFound { .. })));
    }

    #[test]
    fn test_optional_missing_file() {
        let loader = ConfigLoader::new()
            .with_optional_file("/nonexistent/roomlink.toml")
            .unwrap();
        assert!(!loader.file_loaded());
    }

    #[test]
    fn test_unsupported_extension() {
        let file = temp_file(".yaml");
        let result = ConfigLoader::new().with_file(file.path());
        assert!(matches!(result, Err(ConfigError::UnsupportedFormat(_))));
    }

    #[test]
    fn test_env_overrides() {
        let mut loader = ConfigLoader::new();
        loader
            .apply_env_vars(
                "ROOMLINK",
                &vars(&[
                    ("ROOMLINK__HOST", "rooms.example.com"),
                    ("ROOMLINK__PARTY", "chat"),
                    ("ROOMLINK__WAIT_FOR_ROOM", "yes"),
                    ("ROOMLINK__LOG_LEVEL", "info"),
                    ("ROOMLINK__CONNECTION__MAX_AUTH_TRIES", "9"),
                    ("ROOMLINK__CONNECTION__AUTH_BACKOFF_MS", "100, 200,400"),
                    ("ROOMLINK__CONNECTION__PROBE_TIMEOUT_MS", "750"),
                ]),
            )
            .unwrap();

        let config = loader.load_unvalidated();
        assert_eq!(config.host, "rooms.example.com");
        assert_eq!(config.party.as_deref(), Some("chat"));
        assert!(config.wait_for_room);
        assert_eq!(config.log_level, LogLevel::Info);
        assert_eq!(config.connection.max_auth_tries, 9);
        assert_eq!(
            config.connection.auth_backoff,
            vec![
                Duration::from_millis(100),
                Duration::from_millis(200),
                Duration::from_millis(400)
            ]
        );
        assert_eq!(config.connection.probe_timeout, Duration::from_millis(750));
    }

    #[test]
    fn test_env_parse_errors() {
        let mut loader = ConfigLoader::new();
        let result = loader.apply_env_vars(
            "ROOMLINK",
            &vars(&[("ROOMLINK__CONNECTION__MAX_CONN_TRIES", "many")]),
        );
        assert!(matches!(result, Err(ConfigError::EnvVar { .. })));

        let result = loader.apply_env_vars(
            "ROOMLINK",
            &vars(&[("ROOMLINK__WAIT_FOR_ROOM", "perhaps")]),
        );
        assert!(matches!(result, Err(ConfigError::EnvVar { .. })));

        let result =
            loader.apply_env_vars("ROOMLINK", &vars(&[("ROOMLINK__COLOUR", "blue")]));
        assert!(matches!(result, Err(ConfigError::EnvVar { .. })));
    }

    #[test]
    fn test_env_foreign_prefix_ignored() {
        let mut loader = ConfigLoader::new();
        loader
            .apply_env_vars("ROOMLINK", &vars(&[("ROOMLINKER_HOST", "elsewhere")]))
            .unwrap();
        assert_eq!(loader.load_unvalidated().host, crate::DEFAULT_HOST);
    }

    #[test]
    fn test_load_validates() {
        let result = ConfigLoader::new()
            .with_string("room = \"\"", "toml")
            .unwrap()
            .load();
        assert!(matches!(result, Err(ConfigError::MissingField { .. })));
    }

    #[test]
    fn test_with_string_unknown_format() {
        let result = ConfigLoader::new().with_string("", "ini");
        assert!(result.is_err());
    }
}
