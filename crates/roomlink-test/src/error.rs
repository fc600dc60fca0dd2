//! Test error types.

use std::time::Duration;

use roomlink::Stage;
use thiserror::Error;

/// Errors raised by the test helpers.
#[derive(Debug, Error)]
pub enum TestError {
    /// Nothing arrived in time.
    #[error("no stage event within {0:?}")]
    Timeout(Duration),

    /// The session was dropped.
    #[error("stage stream closed")]
    StreamClosed,

    /// The recorder fell behind and lost events.
    #[error("stage recorder lagged, {0} events lost")]
    Lagged(u64),

    /// A different stage arrived than the one expected.
    #[error("expected stage {expected}, got {actual}")]
    UnexpectedStage {
        /// The stage waited for.
        expected: Stage,
        /// The stage that arrived instead.
        actual: Stage,
    },
}
