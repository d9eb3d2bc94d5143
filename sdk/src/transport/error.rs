//! Transport error types.
//!
//! Provides error types for transport operations.

use std::fmt;

/// Transport errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// Connection failed.
    Connection(String),

    /// WebSocket protocol error.
    Protocol(String),

    /// Failed to serialize a command.
    Serialization(String),

    /// Failed to deserialize a reply or push.
    Deserialization(String),

    /// Server replied with an error.
    Server {
        /// Error code.
        code: u32,
        /// Error message.
        message: String,
    },

    /// Not connected.
    NotConnected,

    /// Connection closed.
    Closed,

    /// The server closed the connection and asked not to reconnect.
    Terminal {
        /// Close or disconnect code.
        code: u32,
        /// Reason given by the server.
        reason: String,
    },

    /// The server did not reply in time.
    Timeout,

    /// Invalid configuration.
    InvalidConfig(String),

    /// Send failed.
    SendFailed(String),
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connection(msg) => write!(f, "connection failed: {}", msg),
            Self::Protocol(msg) => write!(f, "protocol error: {}", msg),
            Self::Serialization(msg) => write!(f, "serialization failed: {}", msg),
            Self::Deserialization(msg) => write!(f, "deserialization failed: {}", msg),
            Self::Server { code, message } => write!(f, "server error [{}]: {}", code, message),
            Self::NotConnected => write!(f, "not connected"),
            Self::Closed => write!(f, "connection closed"),
            Self::Terminal { code, reason } => {
                write!(f, "connection closed for good [{}]: {}", code, reason)
            }
            Self::Timeout => write!(f, "reply timeout"),
            Self::InvalidConfig(msg) => write!(f, "invalid configuration: {}", msg),
            Self::SendFailed(msg) => write!(f, "send failed: {}", msg),
        }
    }
}

impl std::error::Error for TransportError {}

impl From<tokio_tungstenite::tungstenite::Error> for TransportError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        Self::Protocol(err.to_string())
    }
}
