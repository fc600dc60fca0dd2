//! Typed configuration for Roomlink sessions.
//!
//! This crate provides the configuration a session is built from, with
//! support for:
//! - TOML and JSON configuration files
//! - Environment variable overrides
//! - Strict validation (fails on unknown fields)
//! - Layered configuration (defaults → file → env)
//!
//! # Overview
//!
//! - [`RoomConfig`] - where to connect (host, room, party, user) and how
//!   verbose to be
//! - [`ConnectionConfig`] - timeouts, heartbeat interval, backoff tables
//!   and retry budgets
//!
//! # Example
//!
//! ```no_run
//! use roomlink_config::ConfigLoader;
//!
//! # fn main() -> Result<(), roomlink_config::ConfigError> {
//! let config = ConfigLoader::new()
//!     .with_defaults()
//!     .with_optional_file("roomlink.toml")?
//!     .with_env_prefix("ROOMLINK")
//!     .load()?;
//!
//! println!("Joining room {} on {}", config.room, config.host);
//! # Ok(())
//! # }
//! ```
//!
//! # Configuration File Format
//!
//! ```toml
//! host = "rooms.example.com"
//! room = "lobby"
//! party = "chat"
//! wait_for_room = false
//! log_level = 2
//!
//! [connection]
//! auth_timeout_ms = 10000
//! socket_connect_timeout_ms = 10000
//! heartbeat_interval_ms = 20000
//! probe_timeout_ms = 2000
//! connection_backoff_ms = [1000, 2000, 4000, 8000]
//! auth_backoff_ms = [1000, 2000, 4000]
//! backoff_fallback_ms = 5000
//! max_conn_tries = 5
//! max_auth_tries = 3
//! ```
//!
//! # Environment Variable Overrides
//!
//! Values can be overridden via environment variables using the format
//! `PREFIX__KEY` or `PREFIX__CONNECTION__KEY`. For example:
//!
//! - `ROOMLINK__ROOM=lobby`
//! - `ROOMLINK__LOG_LEVEL=debug`
//! - `ROOMLINK__CONNECTION__HEARTBEAT_INTERVAL_MS=5000`

#![warn(missing_docs)]

mod config;
mod error;
mod loader;
pub mod schema;

pub use config::{RoomConfig, RoomConfigBuilder, DEFAULT_HOST, DEFAULT_ROOM};
pub use error::ConfigError;
pub use loader::ConfigLoader;
pub use schema::ConnectionConfig;

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;
