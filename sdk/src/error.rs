//! SDK error types.
//!
//! Provides the error types surfaced by the session lifecycle. Token and
//! transport errors live next to their modules ([`crate::auth::AuthError`],
//! [`crate::transport::TransportError`]).

use crate::transport::TransportError;

/// Connection lifecycle errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConnectionError {
    /// The token endpoint permanently denied access. Terminal for the session.
    #[error("authentication denied by token endpoint")]
    AuthDenied,

    /// The reconnect policy ran out of attempts.
    #[error("connection retries exhausted after {attempts} attempts")]
    RetriesExhausted {
        /// Attempts made before giving up.
        attempts: u32,
    },

    /// The server refused the connection and asked not to reconnect.
    #[error("server closed the connection for good [{code}]: {reason}")]
    Terminated {
        /// Close or disconnect code.
        code: u32,
        /// Reason given by the server.
        reason: String,
    },

    /// The connection was released and cannot be reused.
    #[error("connection already released")]
    Released,
}

/// Reaction publishing errors.
#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    /// The primary channel is not subscribed; the reaction was dropped.
    #[error("channel {channel} is not ready, try again shortly")]
    NotReady {
        /// Channel that was not subscribed.
        channel: String,
    },

    /// The pending queue is full; the reaction was dropped.
    #[error("publish queue full ({max_pending} pending)")]
    QueueFull {
        /// Configured queue bound.
        max_pending: usize,
    },

    /// Failed to serialize the reaction payload.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// The transport refused the publish.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
}

/// Session setup errors.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The hosting page URL could not be parsed.
    #[error("invalid page url: {0}")]
    InvalidPageUrl(String),

    /// A required session parameter is missing or empty.
    #[error("missing session parameter: {0}")]
    MissingParameter(&'static str),

    /// Invalid configuration.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Connecting failed.
    #[error(transparent)]
    Connection(#[from] ConnectionError),
}
