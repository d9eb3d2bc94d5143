//! Host analytics.
//!
//! Provides [`AnalyticsAggregator`], which turns each batch published on the
//! host analytics channel into a fresh [`EmojiTally`]. Every batch replaces
//! the previous tally; counts are never carried over.

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::metrics::SessionMetrics;
use crate::registry::SubscriptionHandler;
use crate::types::EmojiTally;

/// Emoji tally for the host view.
///
/// Clones share the same tally.
#[derive(Debug, Clone)]
pub struct AnalyticsAggregator {
    tally_tx: Arc<watch::Sender<EmojiTally>>,
    metrics: Arc<SessionMetrics>,
}

impl Default for AnalyticsAggregator {
    fn default() -> Self {
        Self::new(Arc::new(SessionMetrics::new()))
    }
}

impl AnalyticsAggregator {
    /// Creates an aggregator with an empty tally.
    #[must_use]
    pub fn new(metrics: Arc<SessionMetrics>) -> Self {
        let (tally_tx, _) = watch::channel(EmojiTally::new());
        Self {
            tally_tx: Arc::new(tally_tx),
            metrics,
        }
    }

    /// Replaces the tally with the counts of `batch`.
    ///
    /// Returns false, leaving the tally untouched, if `batch` is not an
    /// array. Entries without a string `emoji` field are skipped.
    pub fn on_publication(&self, batch: &Value) -> bool {
        let Some(entries) = batch.as_array() else {
            warn!(payload = %batch, "analytics payload is not a list, ignored");
            return false;
        };

        let emojis = entries
            .iter()
            .filter_map(|entry| entry.get("emoji").and_then(Value::as_str));
        let tally = EmojiTally::from_emojis(emojis);

        debug!(
            entries = entries.len(),
            distinct = tally.len(),
            total = tally.total(),
            "analytics tally replaced"
        );
        self.tally_tx.send_replace(tally);
        self.metrics.record_tally_update();
        true
    }

    /// Returns a receiver notified on every replacement.
    #[must_use]
    pub fn watch(&self) -> watch::Receiver<EmojiTally> {
        self.tally_tx.subscribe()
    }

    /// Returns a copy of the current tally.
    #[must_use]
    pub fn snapshot(&self) -> EmojiTally {
        self.tally_tx.borrow().clone()
    }
}

impl SubscriptionHandler for AnalyticsAggregator {
    fn on_subscribed(&mut self, channel: &str) {
        debug!(channel, "host analytics live");
    }

    fn on_publication(&mut self, _channel: &str, data: &Value) {
        AnalyticsAggregator::on_publication(self, data);
    }
}
