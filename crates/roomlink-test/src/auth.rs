//! Scripted authenticator.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use roomlink::{AuthFn, AuthParams, BoxFuture, SessionError, SessionResult};

/// What one authentication call does.
#[derive(Debug, Clone)]
pub enum AuthStep {
    /// Succeed with these parameters.
    Ok(AuthParams),
    /// Fail with an ordinary error.
    Fail(String),
    /// Fail with the stop-retry signal.
    StopRetry(String),
    /// Succeed after a delay.
    Delay(Duration, AuthParams),
    /// Never complete.
    Hang,
}

/// An authentication operation that follows a script.
///
/// Once the script runs out every call uses the fallback, which defaults
/// to succeeding with empty parameters.
#[derive(Debug, Clone)]
pub struct ScriptedAuth {
    script: Arc<Mutex<VecDeque<AuthStep>>>,
    fallback: Arc<Mutex<AuthStep>>,
    calls: Arc<AtomicUsize>,
}

impl Default for ScriptedAuth {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedAuth {
    /// Create an authenticator that always succeeds.
    pub fn new() -> Self {
        Self {
            script: Arc::new(Mutex::new(VecDeque::new())),
            fallback: Arc::new(Mutex::new(AuthStep::Ok(AuthParams::new()))),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Create an authenticator whose every call does `step`.
    pub fn always(step: AuthStep) -> Self {
        Self::new().otherwise(step)
    }

    /// Queue the next scripted step.
    pub fn then(self, step: AuthStep) -> Self {
        self.script.lock().push_back(step);
        self
    }

    /// Set the behavior once the script runs out.
    pub fn otherwise(self, step: AuthStep) -> Self {
        *self.fallback.lock() = step;
        self
    }

    /// Number of calls so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Box this authenticator for a session builder.
    pub fn auth_fn(&self) -> AuthFn {
        let this = self.clone();
        Arc::new(move || this.call())
    }

    fn call(&self) -> BoxFuture<'static, SessionResult<AuthParams>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let step = self
            .script
            .lock()
            .pop_front()
            .unwrap_or_else(|| self.fallback.lock().clone());

        Box::pin(async move {
            match step {
                AuthStep::Ok(params) => Ok(params),
                AuthStep::Fail(reason) => Err(SessionError::auth(reason)),
                AuthStep::StopRetry(reason) => Err(SessionError::stop_retry(reason)),
                AuthStep::Delay(delay, params) => {
                    tokio::time::sleep(delay).await;
                    Ok(params)
                }
                AuthStep::Hang => std::future::pending().await,
            }
        })
    }
}
