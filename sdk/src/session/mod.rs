//! Event session lifecycle.
//!
//! [`EventSession`] is one mounted event page. It wires a single
//! [`ConnectionManager`] and [`SubscriptionRegistry`] to the reaction log,
//! the host analytics tally and the publisher, and applies
//! [`TransportEvent`]s in delivery order.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use eventpulse_sdk::{
//!     EventSession, HttpTokenProvider, Session, SessionConfig, Transport, WsConfig, WsTransport,
//! };
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let session = Session::from_page_url("http://localhost:3000/?eventId=42&userType=eventHost")?;
//! let transport: Arc<dyn Transport> = Arc::new(WsTransport::new(WsConfig::default())?);
//! let tokens = Arc::new(HttpTokenProvider::new(Default::default())?);
//!
//! let mut event = EventSession::new(session, Arc::clone(&transport), tokens, SessionConfig::default())?;
//! event.mount().await?;
//!
//! while let Some(ev) = transport.next_event().await {
//!     event.handle_event(ev).await?;
//! }
//!
//! event.unmount().await;
//! # Ok(())
//! # }
//! ```

pub mod config;

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::analytics::AnalyticsAggregator;
use crate::auth::TokenProvider;
use crate::connection::{ConnectionManager, ConnectionState, Connectivity};
use crate::error::{ConnectionError, PublishError, SessionError};
use crate::metrics::SessionMetrics;
use crate::publisher::{PublishOutcome, ReactionPublisher};
use crate::registry::{SubscriptionHandler, SubscriptionRegistry, SubscriptionState};
use crate::stream::ReactionStream;
use crate::transport::{Transport, TransportEvent};
use crate::types::{EmojiTally, EventChannels, ReactionLog, Role, Session};

pub use config::SessionConfig;

/// A mounted event page.
#[derive(Debug)]
pub struct EventSession {
    session: Session,
    channels: EventChannels,
    connection: ConnectionManager,
    registry: SubscriptionRegistry,
    stream: ReactionStream,
    analytics: Option<AnalyticsAggregator>,
    publisher: ReactionPublisher,
    metrics: Arc<SessionMetrics>,
    unmounted: bool,
}

impl EventSession {
    /// Creates an unmounted session.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn new(
        session: Session,
        transport: Arc<dyn Transport>,
        tokens: Arc<dyn TokenProvider>,
        config: SessionConfig,
    ) -> Result<Self, SessionError> {
        config.validate()?;

        let metrics = Arc::new(SessionMetrics::new());
        let channels = session.channels();
        let connection = ConnectionManager::with_metrics(
            Arc::clone(&transport),
            tokens,
            config.reconnect,
            Arc::clone(&metrics),
        );
        let analytics = session
            .role()
            .is_host()
            .then(|| AnalyticsAggregator::new(Arc::clone(&metrics)));
        let publisher = ReactionPublisher::new(
            session.event_id().clone(),
            config.user_id,
            channels.primary.as_str(),
            config.publish_mode,
            Arc::clone(&metrics),
        );

        Ok(Self {
            registry: SubscriptionRegistry::new(transport),
            stream: ReactionStream::new(Arc::clone(&metrics)),
            session,
            channels,
            connection,
            analytics,
            publisher,
            metrics,
            unmounted: false,
        })
    }

    /// Returns the session parameters.
    #[must_use]
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Returns the session role.
    #[must_use]
    pub fn role(&self) -> Role {
        self.session.role()
    }

    /// Returns the channel names of this event.
    #[must_use]
    pub fn channels(&self) -> &EventChannels {
        &self.channels
    }

    /// Returns the current connection state.
    #[must_use]
    pub fn connection_state(&self) -> ConnectionState {
        self.connection.state()
    }

    /// Returns a receiver observing connection state transitions.
    #[must_use]
    pub fn watch_connection(&self) -> watch::Receiver<ConnectionState> {
        self.connection.watch_state()
    }

    /// Returns the state of a channel's subscription.
    #[must_use]
    pub fn subscription_state(&self, channel: &str) -> SubscriptionState {
        self.registry.state(channel)
    }

    /// Returns the subscription registry.
    #[must_use]
    pub fn registry(&self) -> &SubscriptionRegistry {
        &self.registry
    }

    /// Returns a receiver observing the reaction log.
    #[must_use]
    pub fn reactions(&self) -> watch::Receiver<ReactionLog> {
        self.stream.watch()
    }

    /// Returns a copy of the reaction log.
    #[must_use]
    pub fn reaction_log(&self) -> ReactionLog {
        self.stream.snapshot()
    }

    /// Returns a receiver observing the analytics tally (hosts only).
    #[must_use]
    pub fn tally(&self) -> Option<watch::Receiver<EmojiTally>> {
        self.analytics.as_ref().map(AnalyticsAggregator::watch)
    }

    /// Returns the shared metrics.
    #[must_use]
    pub fn metrics(&self) -> Arc<SessionMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Returns the shared transport.
    #[must_use]
    pub fn transport(&self) -> Arc<dyn Transport> {
        Arc::clone(self.connection.transport())
    }

    /// Returns true once [`Self::unmount`] ran.
    #[must_use]
    pub const fn is_unmounted(&self) -> bool {
        self.unmounted
    }

    /// Connects and subscribes to the event channels.
    ///
    /// Calling it again while connected does nothing.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection was denied, gave up retrying or
    /// the session was unmounted.
    pub async fn mount(&mut self) -> Result<(), SessionError> {
        if self.unmounted {
            return Err(ConnectionError::Released.into());
        }

        info!(
            event_id = %self.session.event_id(),
            role = %self.session.role(),
            "mounting event session"
        );

        if self.connection.connect().await? == Connectivity::Connected {
            self.on_connected().await;
        }
        Ok(())
    }

    /// Applies one transport event.
    ///
    /// # Errors
    ///
    /// Returns an error if reconnecting or refreshing the token failed for
    /// good. Channel-level failures are absorbed.
    pub async fn handle_event(&mut self, event: TransportEvent) -> Result<(), SessionError> {
        if self.unmounted {
            debug!(?event, "event after unmount ignored");
            return Ok(());
        }

        match event {
            TransportEvent::Disconnected { reason, reconnect } => {
                self.registry.on_connection_lost();
                if self.connection.on_disconnected(&reason, reconnect)
                    && self.connection.reconnect().await? == Connectivity::Connected
                {
                    self.on_connected().await;
                }
            }
            TransportEvent::RefreshRequired => {
                if let Err(err) = self.connection.refresh_token().await {
                    self.registry.on_connection_lost();
                    return Err(err.into());
                }
            }
            TransportEvent::Subscribed { channel } => {
                if self.registry.on_subscribed(&channel) && channel == self.channels.primary {
                    self.publisher
                        .flush(&self.registry, self.connection.transport().as_ref())
                        .await;
                }
            }
            TransportEvent::SubscribeFailed { channel, reason } => {
                self.registry.on_subscribe_failed(&channel, &reason);
            }
            TransportEvent::Unsubscribed { channel } => {
                self.registry.on_unsubscribed(&channel);
            }
            TransportEvent::Publication { channel, data } => {
                self.registry.on_publication(&channel, &data);
            }
            TransportEvent::Error(reason) => {
                warn!(%reason, "transport error");
                self.metrics.record_transport_error();
            }
        }

        Ok(())
    }

    /// Publishes a reaction on the primary channel.
    ///
    /// # Errors
    ///
    /// See [`ReactionPublisher::publish`].
    pub async fn publish(&mut self, emoji: &str) -> Result<PublishOutcome, PublishError> {
        self.publisher
            .publish(&self.registry, self.connection.transport().as_ref(), emoji)
            .await
    }

    /// Unsubscribes every channel, then releases the connection.
    ///
    /// Both steps always run. Idempotent.
    pub async fn unmount(&mut self) {
        if self.unmounted {
            debug!("session already unmounted");
            return;
        }
        self.unmounted = true;

        self.registry.teardown().await;
        self.connection.disconnect().await;

        info!(
            event_id = %self.session.event_id(),
            reactions = self.stream.len(),
            "event session unmounted"
        );
    }

    /// Connected notification: ensures the channels this role needs.
    async fn on_connected(&mut self) {
        self.registry.on_connected().await;

        let stream = self.stream.clone();
        self.registry
            .ensure_subscription(&self.channels.primary, move || {
                Box::new(stream) as Box<dyn SubscriptionHandler>
            })
            .await;

        if let Some(analytics) = &self.analytics {
            let analytics = analytics.clone();
            self.registry
                .ensure_subscription(&self.channels.analytics, move || {
                    Box::new(analytics) as Box<dyn SubscriptionHandler>
                })
                .await;
        }
    }
}
