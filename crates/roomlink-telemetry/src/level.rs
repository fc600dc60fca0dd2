//! Numeric log verbosity.
//!
//! Sessions are configured with a single number: events below that
//! level are suppressed. [`LogLevel`] gives the numbers names and maps
//! them onto `tracing` filters.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::level_filters::LevelFilter;

use crate::error::TelemetryError;

/// Log verbosity, ordered from most to least verbose.
///
/// Serialized as its numeric value (`0` = trace ... `5` = off).
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(into = "u8", try_from = "u8")]
pub enum LogLevel {
    /// Every event, including per-message payload dumps.
    Trace = 0,
    /// Stale-completion discards and other internals.
    Debug = 1,
    /// Stage transitions and retry scheduling.
    Info = 2,
    /// Misuse of the control surface.
    #[default]
    Warn = 3,
    /// Terminal failures only.
    Error = 4,
    /// Nothing.
    Off = 5,
}

impl LogLevel {
    /// Get the numeric value of this level.
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Convert from a numeric level.
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Trace),
            1 => Some(Self::Debug),
            2 => Some(Self::Info),
            3 => Some(Self::Warn),
            4 => Some(Self::Error),
            5 => Some(Self::Off),
            _ => None,
        }
    }

    /// Whether an event at `level` passes a threshold of `self`.
    pub fn allows(self, level: Self) -> bool {
        level != Self::Off && level >= self
    }

    /// The `tracing` filter equivalent to this threshold.
    pub fn as_filter(self) -> LevelFilter {
        match self {
            Self::Trace => LevelFilter::TRACE,
            Self::Debug => LevelFilter::DEBUG,
            Self::Info => LevelFilter::INFO,
            Self::Warn => LevelFilter::WARN,
            Self::Error => LevelFilter::ERROR,
            Self::Off => LevelFilter::OFF,
        }
    }

    /// The lowercase directive name understood by `EnvFilter`.
    pub fn as_directive(self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
            Self::Off => "off",
        }
    }
}

impl From<LogLevel> for u8 {
    fn from(level: LogLevel) -> Self {
        level.as_u8()
    }
}

impl TryFrom<u8> for LogLevel {
    type Error = TelemetryError;

    fn try_from(value: u8) -> Result<Self, TelemetryError> {
        Self::from_u8(value).ok_or_else(|| TelemetryError::InvalidLevel(value.to_string()))
    }
}

impl FromStr for LogLevel {
    type Err = TelemetryError;

    /// Accepts either the numeric value or the lowercase name.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Ok(value) = s.parse::<u8>() {
            return Self::try_from(value);
        }
        match s.to_ascii_lowercase().as_str() {
            "trace" => Ok(Self::Trace),
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            "warn" | "warning" => Ok(Self::Warn),
            "error" => Ok(Self::Error),
            "off" | "none" => Ok(Self::Off),
            _ => Err(TelemetryError::InvalidLevel(s.to_string())),
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.as_directive(), self.as_u8())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_u8() {
        assert_eq!(LogLevel::from_u8(0), Some(LogLevel::Trace));
        assert_eq!(LogLevel::from_u8(3), Some(LogLevel::Warn));
        assert_eq!(LogLevel::from_u8(5), Some(LogLevel::Off));
        assert_eq!(LogLevel::from_u8(6), None);
    }

    #[test]
    fn test_try_from_u8() {
        assert_eq!(LogLevel::try_from(4).unwrap(), LogLevel::Error);
        let err = LogLevel::try_from(6).unwrap_err();
        assert!(matches!(err, TelemetryError::InvalidLevel(ref v) if v == "6"));
        assert_eq!(u8::from(LogLevel::Error), 4);
    }

    #[test]
    fn test_allows() {
        assert!(LogLevel::Info.allows(LogLevel::Info));
        assert!(LogLevel::Info.allows(LogLevel::Error));
        assert!(!LogLevel::Info.allows(LogLevel::Debug));
        assert!(!LogLevel::Off.allows(LogLevel::Error));
        assert!(!LogLevel::Trace.allows(LogLevel::Off));
    }

    #[test]
    fn test_parse_numeric_and_named() {
        assert_eq!("2".parse::<LogLevel>().unwrap(), LogLevel::Info);
        assert_eq!("DEBUG".parse::<LogLevel>().unwrap(), LogLevel::Debug);
        assert_eq!(" warning ".parse::<LogLevel>().unwrap(), LogLevel::Warn);
        assert!("9".parse::<LogLevel>().is_err());
        assert!("chatty".parse::<LogLevel>().is_err());
    }

    #[test]
    fn test_filter_mapping() {
        assert_eq!(LogLevel::Trace.as_filter(), LevelFilter::TRACE);
        assert_eq!(LogLevel::Off.as_filter(), LevelFilter::OFF);
    }

    #[test]
    fn test_serde_numeric() {
        let json = serde_json::to_string(&LogLevel::Error).unwrap();
        assert_eq!(json, "4");

        let level: LogLevel = serde_json::from_str("1").unwrap();
        assert_eq!(level, LogLevel::Debug);

        assert!(serde_json::from_str::<LogLevel>("7").is_err());
    }

    #[test]
    fn test_display() {
        assert_eq!(LogLevel::Info.to_string(), "info (2)");
    }
}
