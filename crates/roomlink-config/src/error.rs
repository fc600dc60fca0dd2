//! Configuration errors.

use std::path::PathBuf;
use thiserror::Error;

/// Why a room configuration could not be loaded or accepted.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The configuration file does not exist.
    #[error("configuration file not found: {path}")]
    FileNotFound {
        /// Path that was looked up.
        path: PathBuf,
    },

    /// The configuration file exists but could not be read.
    #[error("cannot read configuration file {path}")]
    Read {
        /// Path of the file.
        path: PathBuf,
        /// I/O failure.
        #[source]
        source: std::io::Error,
    },

    /// Malformed TOML, or TOML with unknown keys.
    #[error("invalid TOML configuration: {0}")]
    Toml(#[from] toml::de::Error),

    /// Malformed JSON, or JSON with unknown keys.
    #[error("invalid JSON configuration: {0}")]
    Json(#[from] serde_json::Error),

    /// Only `toml` and `json` are understood.
    #[error("unsupported configuration format: {0}")]
    UnsupportedFormat(String),

    /// A required setting such as the host or room is empty.
    #[error("{field} is required")]
    MissingField {
        /// Setting name.
        field: String,
    },

    /// A setting is present but unusable.
    #[error("invalid {field}: {reason}")]
    InvalidValue {
        /// Setting name.
        field: String,
        /// What is wrong with it.
        reason: String,
    },

    /// An override variable could not be applied.
    #[error("environment variable {var}: {reason}")]
    EnvVar {
        /// Variable name.
        var: String,
        /// What is wrong with it.
        reason: String,
    },

    /// A `.env` file exists but could not be parsed.
    #[error("cannot load .env file: {0}")]
    DotEnv(String),
}

impl ConfigError {
    /// File lookup failed.
    pub fn file_not_found(path: impl Into<PathBuf>) -> Self {
        Self::FileNotFound { path: path.into() }
    }

    /// Reading an existing file failed.
    pub fn read(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Read {
            path: path.into(),
            source,
        }
    }

    /// Unknown format name or file extension.
    pub fn unsupported_format(format: impl Into<String>) -> Self {
        Self::UnsupportedFormat(format.into())
    }

    /// Empty required setting.
    pub fn missing_field(field: impl Into<String>) -> Self {
        Self::MissingField {
            field: field.into(),
        }
    }

    /// Unusable setting.
    pub fn invalid_value(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Unusable override variable.
    pub fn env_var(var: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::EnvVar {
            var: var.into(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_name_the_setting() {
        assert_eq!(ConfigError::missing_field("room").to_string(), "room is required");
        assert_eq!(
            ConfigError::invalid_value("protocol", "expected 'ws' or 'wss'").to_string(),
            "invalid protocol: expected 'ws' or 'wss'"
        );
        assert!(ConfigError::env_var("ROOMLINK__CONNECTION__MAX_CONN_TRIES", "expected integer")
            .to_string()
            .contains("ROOMLINK__CONNECTION__MAX_CONN_TRIES"));
    }

    #[test]
    fn test_read_keeps_source() {
        use std::error::Error as _;

        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err = ConfigError::read("/etc/roomlink.toml", io);
        assert!(err.to_string().contains("/etc/roomlink.toml"));
        assert!(err.source().is_some());
    }

    #[test]
    fn test_parse_errors_convert() {
        let err: ConfigError = toml::from_str::<toml::Value>("host = ").unwrap_err().into();
        assert!(matches!(err, ConfigError::Toml(_)));

        let err: ConfigError = serde_json::from_str::<serde_json::Value>("{").unwrap_err().into();
        assert!(matches!(err, ConfigError::Json(_)));
    }
}
