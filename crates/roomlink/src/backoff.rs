//! Retry scheduling for the authentication and connection stages.
//!
//! Each stage owns a [`Backoff`]: a delay table indexed by the stage's retry
//! count, a fallback delay once the count runs past the table, and a retry
//! budget. The error cells ask it for a [`RetryDecision`]; arming the timer
//! itself happens in the session, under the generation that failed.

use std::time::Duration;

use roomlink_config::ConnectionConfig;

use crate::error::SessionError;

/// What an error cell should do with a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Move to `failed` and stop.
    GiveUp,
    /// Re-enter authentication after the delay.
    RetryAfter(Duration),
}

/// Backoff policy for one stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Backoff {
    table: Vec<Duration>,
    fallback: Duration,
    max_tries: u32,
}

impl Backoff {
    /// Create a policy from a delay table, fallback delay and retry budget.
    pub fn new(table: Vec<Duration>, fallback: Duration, max_tries: u32) -> Self {
        Self {
            table,
            fallback,
            max_tries,
        }
    }

    /// The authentication policy from a connection config.
    pub fn auth(config: &ConnectionConfig) -> Self {
        Self::new(
            config.auth_backoff.clone(),
            config.backoff_fallback,
            config.max_auth_tries,
        )
    }

    /// The connection policy from a connection config.
    pub fn connection(config: &ConnectionConfig) -> Self {
        Self::new(
            config.connection_backoff.clone(),
            config.backoff_fallback,
            config.max_conn_tries,
        )
    }

    /// Delay before the retry numbered `retry` (zero-based).
    ///
    /// A zero entry in the table means retry immediately; only indices past
    /// the end of the table use the fallback.
    pub fn delay(&self, retry: u32) -> Duration {
        usize::try_from(retry)
            .ok()
            .and_then(|i| self.table.get(i))
            .copied()
            .unwrap_or(self.fallback)
    }

    /// Whether `retry` scheduled retries have used up the budget.
    pub fn is_exhausted(&self, retry: u32) -> bool {
        retry >= self.max_tries
    }

    /// Decide what to do after a failure, given the retries already
    /// scheduled.
    ///
    /// Stop-retry errors give up without consulting the budget.
    pub fn decide(&self, retry: u32, error: &SessionError) -> RetryDecision {
        if error.is_stop_retry() || self.is_exhausted(retry) {
            RetryDecision::GiveUp
        } else {
            RetryDecision::RetryAfter(self.delay(retry))
        }
    }

    /// The retry budget.
    pub fn max_tries(&self) -> u32 {
        self.max_tries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    #[test]
    fn test_table_lookup_with_fallback() {
        let backoff = Backoff::new(vec![ms(100), ms(200)], ms(5000), 10);
        assert_eq!(backoff.delay(0), ms(100));
        assert_eq!(backoff.delay(1), ms(200));
        assert_eq!(backoff.delay(2), ms(5000));
        assert_eq!(backoff.delay(u32::MAX), ms(5000));
    }

    #[test]
    fn test_empty_table_uses_fallback() {
        let backoff = Backoff::new(Vec::new(), ms(42), 3);
        assert_eq!(backoff.delay(0), ms(42));
    }

    #[test]
    fn test_zero_entry_is_immediate() {
        let backoff = Backoff::new(vec![ms(0), ms(300)], ms(5000), 3);
        assert_eq!(backoff.delay(0), Duration::ZERO);
        assert_eq!(backoff.delay(1), ms(300));
    }

    #[test]
    fn test_budget() {
        let backoff = Backoff::new(vec![ms(1)], ms(5), 2);
        let err = SessionError::auth("nope");
        assert_eq!(backoff.decide(0, &err), RetryDecision::RetryAfter(ms(1)));
        assert_eq!(backoff.decide(1, &err), RetryDecision::RetryAfter(ms(5)));
        assert_eq!(backoff.decide(2, &err), RetryDecision::GiveUp);
    }

    #[test]
    fn test_stop_retry_bypasses_budget() {
        let backoff = Backoff::new(vec![ms(1)], ms(5), 100);
        let err = SessionError::stop_retry("banned");
        assert_eq!(backoff.decide(0, &err), RetryDecision::GiveUp);
    }

    #[test]
    fn test_zero_budget_never_retries() {
        let backoff = Backoff::new(vec![ms(1)], ms(5), 0);
        assert_eq!(
            backoff.decide(0, &SessionError::connect("refused")),
            RetryDecision::GiveUp
        );
    }

    #[test]
    fn test_from_config() {
        let config = ConnectionConfig::default();
        let auth = Backoff::auth(&config);
        assert_eq!(auth.delay(0), ms(1000));
        assert_eq!(auth.delay(3), ms(5000));
        assert_eq!(auth.max_tries(), 3);

        let conn = Backoff::connection(&config);
        assert_eq!(conn.delay(3), ms(8000));
        assert_eq!(conn.max_tries(), 5);
    }

    proptest! {
        #[test]
        fn prop_delay_is_table_entry_or_fallback(
            table in proptest::collection::vec(0u64..60_000, 0..8),
            fallback in 1u64..60_000,
            retry in 0u32..32,
        ) {
            let backoff = Backoff::new(table.iter().copied().map(ms).collect(), ms(fallback), 5);
            let expected = table.get(retry as usize).copied().map_or(ms(fallback), ms);
            prop_assert_eq!(backoff.delay(retry), expected);
        }

        #[test]
        fn prop_gives_up_exactly_at_budget(max in 0u32..20, retry in 0u32..40) {
            let backoff = Backoff::new(vec![ms(10)], ms(20), max);
            let decision = backoff.decide(retry, &SessionError::connect("refused"));
            prop_assert_eq!(decision == RetryDecision::GiveUp, retry >= max);
        }
    }
}
