//! # Roomlink Test
//!
//! Test utilities for Roomlink sessions, driving the full state machine
//! without a network.
//!
//! ## Key Features
//!
//! - **Scripted transport**: [`MockTransport`] decides per attempt whether
//!   to accept, refuse, hang or answer with the stop-retry code
//! - **Server side**: every accepted socket is a [`MockSocket`] that records
//!   what the session sent and can deliver, fail or close
//! - **Scripted authentication**: [`ScriptedAuth`] succeeds, fails or hangs
//!   per call
//! - **Stage recording**: [`StageRecorder`] collects published stages
//!
//! Pair these with `#[tokio::test(start_paused = true)]` so backoff delays,
//! heartbeats and timeouts run on the virtual clock.
//!
//! ## Example
//!
//! ```ignore
//! use std::time::Duration;
//! use roomlink::{Session, Stage};
//! use roomlink_test::{Attempt, MockTransport, StageRecorder};
//!
//! #[tokio::test(start_paused = true)]
//! async fn test_recovers_after_refusal() {
//!     let transport = MockTransport::new().then(Attempt::Refuse("down".into()));
//!     let session = Session::builder()
//!         .transport(transport.clone())
//!         .build()
//!         .unwrap();
//!     let mut stages = StageRecorder::new(&session);
//!
//!     session.start();
//!     stages.until(Stage::Connected, Duration::from_secs(5)).await.unwrap();
//!     assert_eq!(transport.attempts(), 2);
//! }
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod auth;
mod error;
mod recorder;
mod transport;

pub use auth::{AuthStep, ScriptedAuth};
pub use error::TestError;
pub use recorder::{settle, StageRecorder};
pub use transport::{Attempt, MockSocket, MockTransport};
