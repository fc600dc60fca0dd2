//! Session message types.
//!
//! The session carries application data only: text and binary frames.
//! WebSocket control frames are handled by the transport. Liveness is
//! checked with the literal [`PING`] and [`PONG`] text tokens, which are
//! delivered to message subscribers like any other message.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::{SessionError, SessionResult};

/// Text token sent as a liveness probe.
pub const PING: &str = "PING";

/// Text token that answers a liveness probe.
pub const PONG: &str = "PONG";

/// A message sent or received over the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    /// A text message (UTF-8 encoded).
    Text(String),
    /// A binary message.
    Binary(Vec<u8>),
}

impl Message {
    /// Create a new text message.
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    /// Create a new binary message.
    pub fn binary(data: impl Into<Vec<u8>>) -> Self {
        Self::Binary(data.into())
    }

    /// The liveness probe.
    pub fn ping() -> Self {
        Self::Text(PING.to_string())
    }

    /// The liveness reply.
    pub fn pong() -> Self {
        Self::Text(PONG.to_string())
    }

    /// Check if this is a text message.
    pub fn is_text(&self) -> bool {
        matches!(self, Self::Text(_))
    }

    /// Check if this is a binary message.
    pub fn is_binary(&self) -> bool {
        matches!(self, Self::Binary(_))
    }

    /// Check if this is the liveness probe token.
    pub fn is_ping(&self) -> bool {
        self.as_text() == Some(PING)
    }

    /// Check if this is the liveness reply token.
    pub fn is_pong(&self) -> bool {
        self.as_text() == Some(PONG)
    }

    /// Get the message payload as text.
    ///
    /// Returns `None` if this is not a text message.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            Self::Binary(_) => None,
        }
    }

    /// Get the message payload as bytes.
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::Text(s) => s.as_bytes(),
            Self::Binary(b) => b,
        }
    }

    /// Convert the message into text.
    ///
    /// Returns `None` if this is not a text message.
    pub fn into_text(self) -> Option<String> {
        match self {
            Self::Text(s) => Some(s),
            Self::Binary(_) => None,
        }
    }

    /// Convert the message into bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        match self {
            Self::Text(s) => s.into_bytes(),
            Self::Binary(b) => b,
        }
    }

    /// Try to parse the text message as JSON.
    ///
    /// Returns an error if this is not a text message or if parsing fails.
    pub fn json<T: for<'de> Deserialize<'de>>(&self) -> SessionResult<T> {
        let text = self
            .as_text()
            .ok_or_else(|| SessionError::DecodeFailed("not a text message".to_string()))?;
        serde_json::from_str(text).map_err(|e| SessionError::DecodeFailed(e.to_string()))
    }

    /// Create a text message from a JSON-serializable value.
    pub fn from_json<T: Serialize>(value: &T) -> SessionResult<Self> {
        let text = serde_json::to_string(value)
            .map_err(|e| SessionError::EncodeFailed(e.to_string()))?;
        Ok(Self::Text(text))
    }

    /// Get the length of the message payload in bytes.
    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    /// Check if the message payload is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Convert an inbound tungstenite frame.
    ///
    /// Control frames (ping, pong, close, raw frames) carry no session
    /// data and yield `None`.
    pub fn from_frame(frame: tungstenite::Message) -> Option<Self> {
        match frame {
            tungstenite::Message::Text(s) => Some(Self::Text(s.to_string())),
            tungstenite::Message::Binary(b) => Some(Self::Binary(b.to_vec())),
            tungstenite::Message::Ping(_)
            | tungstenite::Message::Pong(_)
            | tungstenite::Message::Close(_)
            | tungstenite::Message::Frame(_) => None,
        }
    }
}

impl From<String> for Message {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<&str> for Message {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<Vec<u8>> for Message {
    fn from(b: Vec<u8>) -> Self {
        Self::Binary(b)
    }
}

impl From<Bytes> for Message {
    fn from(b: Bytes) -> Self {
        Self::Binary(b.to_vec())
    }
}

impl From<&[u8]> for Message {
    fn from(b: &[u8]) -> Self {
        Self::Binary(b.to_vec())
    }
}

/// Convert to tungstenite Message.
impl From<Message> for tungstenite::Message {
    fn from(msg: Message) -> Self {
        match msg {
            Message::Text(s) => Self::Text(s.into()),
            Message::Binary(b) => Self::Binary(b.into()),
        }
    }
}
