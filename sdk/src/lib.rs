//! EventPulse SDK - client library for live event reactions.
//!
//! This crate manages the client side of a live event page connected to a
//! Centrifugo publish/subscribe server: authenticated connection, one
//! subscription per event channel, an ordered reaction log, the host-only
//! analytics tally, and reaction publishing.
//!
//! # Lifecycle
//!
//! - [`ConnectionManager`] - token fetch, connect, backoff, refresh, release
//! - [`SubscriptionRegistry`] - at most one [`Subscription`] per channel
//! - [`ReactionStream`] - append-only [`ReactionLog`]
//! - [`AnalyticsAggregator`] - [`EmojiTally`] replaced on every batch
//! - [`ReactionPublisher`] - readiness-gated publishing
//! - [`EventSession`] - wires the above for one mounted event page
//!
//! # Seams
//!
//! - [`TokenProvider`] - where connection tokens come from ([`HttpTokenProvider`])
//! - [`Transport`] - the pub/sub connection ([`WsTransport`])
//!
//! # Example
//!
//! ```rust
//! use eventpulse_sdk::{EventChannels, EventId, Role, Session};
//!
//! let session = Session::new(EventId::new("42"), Role::Host);
//! let channels = session.channels();
//!
//! assert_eq!(channels.primary, "event-channel-42");
//! assert_eq!(channels.analytics, "event-channel-42-host-analytics");
//! ```

pub mod analytics;
pub mod auth;
pub mod connection;
pub mod error;
pub mod metrics;
pub mod publisher;
pub mod registry;
pub mod session;
pub mod stream;
pub mod transport;
pub mod types;
pub mod ws;

#[cfg(test)]
mod testing;

pub use analytics::AnalyticsAggregator;
pub use auth::{AuthError, AuthToken, HttpTokenProvider, TokenConfig, TokenProvider};
pub use connection::{ConnectionManager, ConnectionState, Connectivity, ReconnectPolicy};
pub use error::{ConnectionError, PublishError, SessionError};
pub use metrics::{SessionMetrics, SessionMetricsSnapshot};
pub use publisher::{PublishMode, PublishOutcome, ReactionPublisher};
pub use registry::{Subscription, SubscriptionHandler, SubscriptionRegistry, SubscriptionState};
pub use session::{EventSession, SessionConfig};
pub use stream::ReactionStream;
pub use transport::{Transport, TransportError, TransportEvent};
pub use types::{
    EmojiTally, EventChannels, EventId, Reaction, ReactionLog, Role, Session, EMOJI_SET,
};
pub use ws::{WsConfig, WsTransport};
