//! Authentication stage.
//!
//! Before every socket attempt the session runs the configured
//! authentication operation under `auth_timeout`. Its [`AuthParams`] may
//! redirect the attempt to another host or room and supply query data.
//! Without an operation the stage succeeds immediately with empty
//! parameters.

use std::future::Future;
use std::sync::Arc;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::backoff::{Backoff, RetryDecision};
use crate::error::{SessionError, SessionResult};
use crate::generation::Generation;
use crate::session::{Inner, SessionState};
use crate::stage::Stage;
use crate::timeout::with_timeout;
use crate::transport::BoxFuture;

/// A shareable authentication operation.
///
/// Returning [`SessionError::StopRetry`] ends the session without
/// consulting the retry budget.
pub type AuthFn = Arc<dyn Fn() -> BoxFuture<'static, SessionResult<AuthParams>> + Send + Sync>;

/// Box an async closure as an [`AuthFn`].
///
/// # Example
///
/// ```
/// use roomlink::{auth_fn, AuthParams};
///
/// let auth = auth_fn(|| async { Ok(AuthParams::new().param("token", "secret")) });
/// # let _ = auth;
/// ```
pub fn auth_fn<F, Fut>(f: F) -> AuthFn
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = SessionResult<AuthParams>> + Send + 'static,
{
    Arc::new(move || -> BoxFuture<'static, SessionResult<AuthParams>> { Box::pin(f()) })
}

/// What a successful authentication hands to the connection stage.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthParams {
    /// Host override for this attempt.
    pub host: Option<String>,
    /// Room override for this attempt.
    pub room: Option<String>,
    /// Query parameters. When present they replace the `_pk` parameter and
    /// the user id is added as `userId`.
    pub data: Option<IndexMap<String, String>>,
}

impl AuthParams {
    /// Create empty parameters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the host.
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    /// Override the room.
    pub fn room(mut self, room: impl Into<String>) -> Self {
        self.room = Some(room.into());
        self
    }

    /// Add a query parameter.
    pub fn param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.data
            .get_or_insert_with(IndexMap::new)
            .insert(key.into(), value.into());
        self
    }
}

impl Inner {
    /// Enter `authenticating` under the live generation.
    pub(crate) fn enter_auth(self: &Arc<Self>, state: &mut SessionState) {
        self.transition(state, Stage::Authenticating);
        let tag = state.generation.current();

        let Some(auth) = self.auth.clone() else {
            debug!(generation = tag.value(), "No authentication configured");
            self.enter_connecting(state, tag, AuthParams::default());
            return;
        };

        let timeout = self.connection().auth_timeout;
        let inner = Arc::clone(self);
        tokio::spawn(async move {
            let result = with_timeout("authentication", timeout, auth()).await;
            inner.on_auth_complete(tag, result);
        });
    }

    fn on_auth_complete(self: &Arc<Self>, tag: Generation, result: SessionResult<AuthParams>) {
        let mut state = self.state.lock();
        if state.generation.is_stale(tag) {
            debug!(
                generation = tag.value(),
                ok = result.is_ok(),
                "Stale authentication result discarded"
            );
            return;
        }

        match result {
            Ok(params) => {
                info!(generation = tag.value(), "Authenticated");
                self.enter_connecting(&mut state, tag, params);
            }
            Err(error) => self.auth_error(&mut state, tag, error),
        }
    }

    fn auth_error(self: &Arc<Self>, state: &mut SessionState, tag: Generation, error: SessionError) {
        self.transition(state, Stage::AuthError);

        match Backoff::auth(self.connection()).decide(state.auth_retry, &error) {
            RetryDecision::GiveUp => {
                error!(
                    generation = tag.value(),
                    retry = state.auth_retry,
                    error = %error,
                    "Authentication failed, giving up"
                );
                self.fail(state);
            }
            RetryDecision::RetryAfter(delay) => {
                info!(
                    generation = tag.value(),
                    retry = state.auth_retry,
                    delay_ms = delay.as_millis() as u64,
                    error = %error,
                    "Authentication failed, retry scheduled"
                );
                self.schedule_reauth(tag, delay);
                state.auth_retry += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_params_builder() {
        let params = AuthParams::new()
            .host("eu.example.com")
            .room("lobby")
            .param("token", "abc")
            .param("v", "2");

        assert_eq!(params.host.as_deref(), Some("eu.example.com"));
        assert_eq!(params.room.as_deref(), Some("lobby"));
        let data = params.data.unwrap();
        assert_eq!(data.keys().collect::<Vec<_>>(), ["token", "v"]);
    }

    #[test]
    fn test_params_default_is_empty() {
        let params = AuthParams::default();
        assert!(params.host.is_none());
        assert!(params.room.is_none());
        assert!(params.data.is_none());
    }

    #[tokio::test]
    async fn test_auth_fn_boxes_closure() {
        let auth = auth_fn(|| async { Ok(AuthParams::new().room("r")) });
        let params = auth().await.unwrap();
        assert_eq!(params.room.as_deref(), Some("r"));

        let refuse = auth_fn(|| async { Err(SessionError::stop_retry("banned")) });
        assert!(refuse().await.unwrap_err().is_stop_retry());
    }
}
