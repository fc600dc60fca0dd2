//! Session stages and the caller-facing status derived from them.

use std::fmt;

use serde::Serialize;

use crate::generation::Generation;

/// The fine-grained state of a session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Not running, or reset by `stop`/`close`/a stop-retry close.
    #[default]
    Initial,
    /// Waiting on the authentication operation.
    Authenticating,
    /// Authentication failed; deciding whether to retry.
    AuthError,
    /// Opening a socket.
    Connecting,
    /// The socket attempt failed; deciding whether to retry.
    ConnectionError,
    /// A socket is installed and the heartbeat is running.
    Connected,
    /// A retry budget ran out or a stop-retry signal arrived.
    Failed,
}

impl Stage {
    /// Get the stage name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Initial => "initial",
            Self::Authenticating => "authenticating",
            Self::AuthError => "auth_error",
            Self::Connecting => "connecting",
            Self::ConnectionError => "connection_error",
            Self::Connected => "connected",
            Self::Failed => "failed",
        }
    }

    /// Derive the caller-facing status.
    ///
    /// In-progress stages read as `reconnecting` once the generation has
    /// moved past zero, and `initial` reads as `closed`.
    pub fn status(self, generation: Generation) -> Status {
        match self {
            Self::Authenticating | Self::AuthError | Self::Connecting | Self::ConnectionError => {
                if generation.is_initial() {
                    Status::Connecting
                } else {
                    Status::Reconnecting
                }
            }
            Self::Connected => Status::Connected,
            Self::Failed => Status::Disconnected,
            Self::Initial => {
                if generation.is_initial() {
                    Status::Initial
                } else {
                    Status::Closed
                }
            }
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The coarse, caller-facing view of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    /// Never started.
    Initial,
    /// First attempt in progress.
    Connecting,
    /// Connected.
    Connected,
    /// A later attempt in progress.
    Reconnecting,
    /// Gave up.
    Disconnected,
    /// Stopped or closed after having run.
    Closed,
}

impl Status {
    /// Get the status name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Initial => "initial",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Reconnecting => "reconnecting",
            Self::Disconnected => "disconnected",
            Self::Closed => "closed",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generation::GenerationGuard;

    fn later() -> Generation {
        let mut guard = GenerationGuard::new();
        guard.bump()
    }

    #[test]
    fn test_in_progress_stages() {
        for stage in [
            Stage::Authenticating,
            Stage::AuthError,
            Stage::Connecting,
            Stage::ConnectionError,
        ] {
            assert_eq!(stage.status(Generation::ZERO), Status::Connecting);
            assert_eq!(stage.status(later()), Status::Reconnecting);
        }
    }

    #[test]
    fn test_terminal_stages() {
        assert_eq!(Stage::Connected.status(later()), Status::Connected);
        assert_eq!(Stage::Failed.status(Generation::ZERO), Status::Disconnected);
        assert_eq!(Stage::Initial.status(Generation::ZERO), Status::Initial);
        assert_eq!(Stage::Initial.status(later()), Status::Closed);
    }

    #[test]
    fn test_names() {
        assert_eq!(Stage::AuthError.to_string(), "auth_error");
        assert_eq!(Status::Reconnecting.to_string(), "reconnecting");
        assert_eq!(
            serde_json::to_string(&Stage::ConnectionError).unwrap(),
            "\"connection_error\""
        );
    }
}
