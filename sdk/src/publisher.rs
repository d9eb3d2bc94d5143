//! Reaction publishing.
//!
//! Provides [`ReactionPublisher`], which turns an emoji choice into a
//! reaction on the primary event channel. Publishing is gated on the primary
//! subscription being `Subscribed`; what happens otherwise depends on the
//! [`PublishMode`].

use std::collections::VecDeque;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::error::PublishError;
use crate::metrics::SessionMetrics;
use crate::registry::SubscriptionRegistry;
use crate::transport::Transport;
use crate::types::{EventId, Reaction};

/// Default bound for the pending queue.
pub const DEFAULT_MAX_PENDING: usize = 32;

/// What to do with a reaction published before the channel is ready.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PublishMode {
    /// Drop it and report [`PublishError::NotReady`].
    #[default]
    Drop,
    /// Queue it and send it once the channel is subscribed.
    QueueUntilSubscribed {
        /// Maximum queued reactions.
        max_pending: usize,
    },
}

impl PublishMode {
    /// Queue mode with [`DEFAULT_MAX_PENDING`].
    #[must_use]
    pub const fn queued() -> Self {
        Self::QueueUntilSubscribed {
            max_pending: DEFAULT_MAX_PENDING,
        }
    }
}

/// Result of a successful publish call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishOutcome {
    /// Handed to the transport.
    Sent(Reaction),
    /// Waiting for the channel to become subscribed.
    Queued(Reaction),
}

impl PublishOutcome {
    /// Returns the reaction.
    #[must_use]
    pub fn reaction(&self) -> &Reaction {
        match self {
            Self::Sent(reaction) | Self::Queued(reaction) => reaction,
        }
    }
}

/// Publishes reactions for one event and user.
#[derive(Debug)]
pub struct ReactionPublisher {
    event_id: EventId,
    user_id: String,
    channel: String,
    mode: PublishMode,
    pending: VecDeque<Reaction>,
    metrics: Arc<SessionMetrics>,
}

impl ReactionPublisher {
    /// Creates a publisher for `channel`.
    #[must_use]
    pub fn new(
        event_id: EventId,
        user_id: impl Into<String>,
        channel: impl Into<String>,
        mode: PublishMode,
        metrics: Arc<SessionMetrics>,
    ) -> Self {
        Self {
            event_id,
            user_id: user_id.into(),
            channel: channel.into(),
            mode,
            pending: VecDeque::new(),
            metrics,
        }
    }

    /// Returns the target channel.
    #[must_use]
    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Returns the publish mode.
    #[must_use]
    pub const fn mode(&self) -> PublishMode {
        self.mode
    }

    /// Returns the number of queued reactions.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Publishes a reaction with the given emoji.
    ///
    /// Fire-and-forget: success means the transport accepted the message,
    /// not that the server delivered it. The reaction shows up in the
    /// reaction log only when the server echoes it back.
    ///
    /// # Errors
    ///
    /// - [`PublishError::NotReady`] if the channel is not subscribed in
    ///   [`PublishMode::Drop`].
    /// - [`PublishError::QueueFull`] if the pending queue is at its bound.
    /// - [`PublishError::Transport`] if the transport refused the message.
    pub async fn publish(
        &mut self,
        registry: &SubscriptionRegistry,
        transport: &dyn Transport,
        emoji: &str,
    ) -> Result<PublishOutcome, PublishError> {
        let reaction = Reaction::new(self.event_id.clone(), emoji, self.user_id.as_str());

        if !registry.is_subscribed(&self.channel) {
            return self.hold(reaction);
        }

        if !self.pending.is_empty() {
            self.flush(registry, transport).await;
        }

        self.send(transport, &reaction).await?;
        Ok(PublishOutcome::Sent(reaction))
    }

    /// Sends queued reactions in order once the channel is subscribed.
    ///
    /// Returns how many were handed to the transport. Reactions the
    /// transport refuses are dropped.
    pub async fn flush(&mut self, registry: &SubscriptionRegistry, transport: &dyn Transport) -> usize {
        if self.pending.is_empty() || !registry.is_subscribed(&self.channel) {
            return 0;
        }

        let mut sent = 0;
        while let Some(reaction) = self.pending.pop_front() {
            match self.send(transport, &reaction).await {
                Ok(()) => sent += 1,
                Err(err) => warn!(emoji = %reaction.emoji, error = %err, "queued reaction dropped"),
            }
        }

        info!(channel = %self.channel, sent, "pending reactions flushed");
        sent
    }

    fn hold(&mut self, reaction: Reaction) -> Result<PublishOutcome, PublishError> {
        match self.mode {
            PublishMode::Drop => {
                warn!(channel = %self.channel, emoji = %reaction.emoji, "channel not ready, reaction dropped");
                self.metrics.record_dropped();
                Err(PublishError::NotReady {
                    channel: self.channel.clone(),
                })
            }
            PublishMode::QueueUntilSubscribed { max_pending } => {
                if self.pending.len() >= max_pending {
                    warn!(channel = %self.channel, max_pending, "publish queue full, reaction dropped");
                    self.metrics.record_dropped();
                    return Err(PublishError::QueueFull { max_pending });
                }

                debug!(channel = %self.channel, emoji = %reaction.emoji, "reaction queued");
                self.metrics.record_queued();
                self.pending.push_back(reaction.clone());
                Ok(PublishOutcome::Queued(reaction))
            }
        }
    }

    async fn send(&self, transport: &dyn Transport, reaction: &Reaction) -> Result<(), PublishError> {
        let data =
            serde_json::to_value(reaction).map_err(|e| PublishError::Serialization(e.to_string()))?;

        if let Err(err) = transport.publish(&self.channel, data).await {
            self.metrics.record_dropped();
            self.metrics.record_transport_error();
            return Err(err.into());
        }

        debug!(channel = %self.channel, emoji = %reaction.emoji, "reaction published");
        self.metrics.record_published();
        Ok(())
    }
}
