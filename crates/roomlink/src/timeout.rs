//! Racing a stage against its time limit.

use std::future::Future;
use std::time::Duration;

use crate::error::{SessionError, SessionResult};

/// Await `future`, failing with [`SessionError::Timeout`] once `after`
/// elapses.
///
/// The same primitive bounds the authentication operation, the socket open
/// and the pong wait. On timeout the future is dropped, which releases
/// anything it owned.
pub async fn with_timeout<T, F>(stage: &'static str, after: Duration, future: F) -> SessionResult<T>
where
    F: Future<Output = SessionResult<T>>,
{
    match tokio::time::timeout(after, future).await {
        Ok(result) => result,
        Err(_) => Err(SessionError::timeout(stage, after)),
    }
}
