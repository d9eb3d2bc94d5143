//! Transport capability.
//!
//! The lifecycle core never talks to a socket directly. It drives an
//! implementation of [`Transport`], which owns the physical connection and
//! reports what happened on it as [`TransportEvent`]s. [`crate::ws::WsTransport`]
//! is the WebSocket implementation.
//!
//! # Event contract
//!
//! - `connect` resolves once the server accepted the credentials.
//! - `subscribe` and `unsubscribe` only send the request; the outcome arrives
//!   later as [`TransportEvent::Subscribed`], [`TransportEvent::SubscribeFailed`]
//!   or [`TransportEvent::Unsubscribed`].
//! - `publish` is fire-and-forget.
//! - Events for one channel are delivered in server emission order.

pub mod error;

use async_trait::async_trait;
use serde_json::Value;

use crate::auth::AuthToken;

pub use error::TransportError;

/// Something that happened on the transport.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// The connection dropped.
    Disconnected {
        /// Close reason reported by the server or the socket.
        reason: String,
        /// False when the server asked the client not to come back.
        reconnect: bool,
    },

    /// The connection token is about to expire.
    RefreshRequired,

    /// A subscription was confirmed by the server.
    Subscribed {
        /// Channel name.
        channel: String,
    },

    /// The server rejected a subscription.
    SubscribeFailed {
        /// Channel name.
        channel: String,
        /// Rejection reason.
        reason: String,
    },

    /// A subscription ended.
    Unsubscribed {
        /// Channel name.
        channel: String,
    },

    /// A message arrived on a subscribed channel.
    Publication {
        /// Channel name.
        channel: String,
        /// Publication payload.
        data: Value,
    },

    /// A non-fatal transport error, surfaced for observability.
    Error(String),
}

impl TransportEvent {
    /// Returns the channel this event belongs to, if any.
    #[must_use]
    pub fn channel(&self) -> Option<&str> {
        match self {
            Self::Subscribed { channel }
            | Self::SubscribeFailed { channel, .. }
            | Self::Unsubscribed { channel }
            | Self::Publication { channel, .. } => Some(channel),
            Self::Disconnected { .. } | Self::RefreshRequired | Self::Error(_) => None,
        }
    }
}

/// A publish/subscribe transport connection.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Opens the connection authenticated with `token`.
    async fn connect(&self, token: &AuthToken) -> Result<(), TransportError>;

    /// Hands a refreshed token to a live connection.
    async fn refresh(&self, token: &AuthToken) -> Result<(), TransportError>;

    /// Closes the connection. Safe to call when not connected.
    async fn disconnect(&self) -> Result<(), TransportError>;

    /// Requests membership in `channel`.
    async fn subscribe(&self, channel: &str) -> Result<(), TransportError>;

    /// Leaves `channel`.
    async fn unsubscribe(&self, channel: &str) -> Result<(), TransportError>;

    /// Publishes `data` to `channel` without waiting for acknowledgement.
    async fn publish(&self, channel: &str, data: Value) -> Result<(), TransportError>;

    /// Waits for the next event. Returns `None` once the transport is dropped.
    async fn next_event(&self) -> Option<TransportEvent>;
}
