//! Reaction stream.
//!
//! Appends every publication received on the primary event channel to a
//! [`ReactionLog`] that observers read through a `watch` channel.

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::watch;
use tracing::debug;

use crate::metrics::SessionMetrics;
use crate::registry::SubscriptionHandler;
use crate::types::{Reaction, ReactionLog};

/// Ordered log of reactions for one event.
///
/// Clones share the same log.
#[derive(Debug, Clone)]
pub struct ReactionStream {
    log_tx: Arc<watch::Sender<ReactionLog>>,
    metrics: Arc<SessionMetrics>,
}

impl Default for ReactionStream {
    fn default() -> Self {
        Self::new(Arc::new(SessionMetrics::new()))
    }
}

impl ReactionStream {
    /// Creates an empty stream.
    #[must_use]
    pub fn new(metrics: Arc<SessionMetrics>) -> Self {
        let (log_tx, _) = watch::channel(ReactionLog::new());
        Self {
            log_tx: Arc::new(log_tx),
            metrics,
        }
    }

    /// Appends a reaction. No deduplication, no validation.
    pub fn on_publication(&self, reaction: Reaction) {
        debug!(emoji = %reaction.emoji, user_id = %reaction.user_id, "reaction received");
        self.metrics.record_publication();
        self.log_tx.send_modify(|log| log.push(reaction));
    }

    /// Returns a receiver notified on every append.
    #[must_use]
    pub fn watch(&self) -> watch::Receiver<ReactionLog> {
        self.log_tx.subscribe()
    }

    /// Returns a copy of the current log.
    #[must_use]
    pub fn snapshot(&self) -> ReactionLog {
        self.log_tx.borrow().clone()
    }

    /// Returns the number of reactions received.
    #[must_use]
    pub fn len(&self) -> usize {
        self.log_tx.borrow().len()
    }

    /// Returns true if nothing was received yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.log_tx.borrow().is_empty()
    }
}

impl SubscriptionHandler for ReactionStream {
    fn on_subscribed(&mut self, channel: &str) {
        debug!(channel, "reaction stream live");
    }

    fn on_publication(&mut self, _channel: &str, data: &Value) {
        ReactionStream::on_publication(self, Reaction::from_payload(data));
    }

    fn on_unsubscribed(&mut self, channel: &str) {
        debug!(channel, reactions = self.len(), "reaction stream closed");
    }
}
