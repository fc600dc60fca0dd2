//! Logging support for Roomlink.
//!
//! Session code logs through `tracing`. This crate owns the pieces around it:
//!
//! - [`LogLevel`]: the numeric verbosity a session is configured with
//! - [`LogConfig`] / [`init_logging`]: a `tracing-subscriber` pipeline
//!   with JSON or pretty output
//!
//! # Example
//!
//! ```rust,ignore
//! use roomlink_telemetry::{init_logging, LogConfig, LogLevel};
//!
//! fn main() -> Result<(), roomlink_telemetry::TelemetryError> {
//!     init_logging(&LogConfig::for_level(LogLevel::Info))?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]

pub mod error;
pub mod level;
pub mod logging;

pub use error::TelemetryError;
pub use level::LogLevel;
pub use logging::{create_env_filter, init_logging, LogConfig};

/// Result type for telemetry operations.
pub type TelemetryResult<T> = Result<T, TelemetryError>;
