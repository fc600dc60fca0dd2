//! Error types for session operations.
//!
//! Every stage reports failures through [`SessionError`]. The error cells
//! only distinguish two kinds: [`SessionError::StopRetry`], which ends the
//! session regardless of the remaining retry budget, and everything else,
//! which feeds the backoff path.

use std::fmt;
use std::time::Duration;

use roomlink_config::ConfigError;
use thiserror::Error;

/// Result type for session operations.
pub type SessionResult<T> = Result<T, SessionError>;

/// Errors that can occur while running a session.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The peer or the authentication operation asked the session to stop
    /// retrying.
    #[error("stop retrying: {0}")]
    StopRetry(String),

    /// The authentication operation failed.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// A stage did not complete in time.
    #[error("{stage} timed out after {after:?}")]
    Timeout {
        /// What was being awaited.
        stage: &'static str,
        /// The configured limit.
        after: Duration,
    },

    /// A socket could not be opened.
    #[error("connection failed: {0}")]
    Connect(String),

    /// The socket closed before it became usable.
    #[error("connection closed: {reason}")]
    ConnectionClosed {
        /// Optional close code from the peer.
        code: Option<u16>,
        /// Reason for closing.
        reason: String,
    },

    /// Failed to send a message.
    #[error("failed to send message: {0}")]
    SendFailed(String),

    /// The message payload could not be encoded.
    #[error("failed to encode message: {0}")]
    EncodeFailed(String),

    /// The message payload could not be decoded.
    #[error("failed to decode message: {0}")]
    DecodeFailed(String),

    /// The session was misconfigured.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Tungstenite error.
    #[error("tungstenite error: {0}")]
    Tungstenite(#[from] tungstenite::Error),
}

impl SessionError {
    /// Create a new stop-retry error.
    pub fn stop_retry(reason: impl Into<String>) -> Self {
        Self::StopRetry(reason.into())
    }

    /// Create a new authentication error.
    pub fn auth(reason: impl Into<String>) -> Self {
        Self::Auth(reason.into())
    }

    /// Create a new timeout error.
    pub fn timeout(stage: &'static str, after: Duration) -> Self {
        Self::Timeout { stage, after }
    }

    /// Create a new connection error.
    pub fn connect(reason: impl Into<String>) -> Self {
        Self::Connect(reason.into())
    }

    /// Create a new connection closed error.
    pub fn connection_closed(code: Option<u16>, reason: impl Into<String>) -> Self {
        Self::ConnectionClosed {
            code,
            reason: reason.into(),
        }
    }

    /// Create a new send failed error.
    pub fn send_failed(reason: impl Into<String>) -> Self {
        Self::SendFailed(reason.into())
    }

    /// Check if this error must bypass the retry budget.
    pub fn is_stop_retry(&self) -> bool {
        matches!(self, Self::StopRetry(_))
    }

    /// Check if this error is a timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// Get the close code if this is a connection closed error.
    pub fn close_code(&self) -> Option<u16> {
        match self {
            Self::ConnectionClosed { code, .. } => *code,
            _ => None,
        }
    }
}

/// Close codes the session sends or interprets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum CloseCode {
    /// Normal closure (1000).
    Normal = 1000,
    /// Going away (1001).
    GoingAway = 1001,
    /// Abnormal closure (1006), reported when the stream ends without a
    /// close frame.
    Abnormal = 1006,
    /// Peer-initiated close meaning "do not reconnect" (4000).
    StopRetry = 4000,
}

impl CloseCode {
    /// Convert from a u16 code.
    pub fn from_u16(code: u16) -> Option<Self> {
        match code {
            1000 => Some(Self::Normal),
            1001 => Some(Self::GoingAway),
            1006 => Some(Self::Abnormal),
            4000 => Some(Self::StopRetry),
            _ => None,
        }
    }

    /// Get the u16 value of this close code.
    pub fn as_u16(self) -> u16 {
        self as u16
    }

    /// Check whether a received close code is the stop-retry sentinel.
    pub fn is_stop_retry(code: Option<u16>) -> bool {
        code == Some(Self::StopRetry.as_u16())
    }
}

impl fmt::Display for CloseCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Normal => "Normal",
            Self::GoingAway => "GoingAway",
            Self::Abnormal => "Abnormal",
            Self::StopRetry => "StopRetry",
        };
        write!(f, "{} ({})", name, self.as_u16())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stop_retry_is_tagged() {
        let err = SessionError::stop_retry("banned");
        assert!(err.is_stop_retry());
        assert!(err.to_string().contains("banned"));

        assert!(!SessionError::auth("bad token").is_stop_retry());
        assert!(!SessionError::connect("refused").is_stop_retry());
    }

    #[test]
    fn test_timeout_error() {
        let err = SessionError::timeout("authentication", Duration::from_millis(250));
        assert!(err.is_timeout());
        assert_eq!(err.to_string(), "authentication timed out after 250ms");
    }

    #[test]
    fn test_connection_closed() {
        let err = SessionError::connection_closed(Some(4000), "go away");
        assert_eq!(err.close_code(), Some(4000));
        assert_eq!(SessionError::connect("x").close_code(), None);
    }

    #[test]
    fn test_config_error_converts() {
        let err: SessionError = ConfigError::invalid_value("room", "must not be empty").into();
        assert!(matches!(err, SessionError::Config(_)));
        assert!(err.to_string().contains("room"));
    }

    #[test]
    fn test_close_code_from_u16() {
        assert_eq!(CloseCode::from_u16(1000), Some(CloseCode::Normal));
        assert_eq!(CloseCode::from_u16(4000), Some(CloseCode::StopRetry));
        assert_eq!(CloseCode::from_u16(4001), None);
    }

    #[test]
    fn test_close_code_sentinel() {
        assert!(CloseCode::is_stop_retry(Some(4000)));
        assert!(!CloseCode::is_stop_retry(Some(1000)));
        assert!(!CloseCode::is_stop_retry(None));
    }

    #[test]
    fn test_close_code_display() {
        assert_eq!(CloseCode::Normal.to_string(), "Normal (1000)");
        assert_eq!(CloseCode::StopRetry.to_string(), "StopRetry (4000)");
    }
}
