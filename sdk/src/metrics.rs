//! Session metrics.
//!
//! Provides atomic counters for monitoring a mounted event session.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Metrics for one event session.
#[derive(Debug)]
pub struct SessionMetrics {
    /// Publications received on any channel.
    publications_received: AtomicU64,

    /// Reactions handed to the transport.
    reactions_published: AtomicU64,

    /// Reactions dropped before reaching the transport.
    reactions_dropped: AtomicU64,

    /// Reactions queued while the channel was not ready.
    reactions_queued: AtomicU64,

    /// Analytics tally replacements.
    tally_updates: AtomicU64,

    /// Successful connects after the first one.
    reconnects: AtomicU64,

    /// Token fetches.
    token_fetches: AtomicU64,

    /// Transport errors observed.
    transport_errors: AtomicU64,

    /// Start time for rate calculation.
    start_time: Instant,
}

impl Default for SessionMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionMetrics {
    /// Creates a new metrics instance.
    #[must_use]
    pub fn new() -> Self {
        Self {
            publications_received: AtomicU64::new(0),
            reactions_published: AtomicU64::new(0),
            reactions_dropped: AtomicU64::new(0),
            reactions_queued: AtomicU64::new(0),
            tally_updates: AtomicU64::new(0),
            reconnects: AtomicU64::new(0),
            token_fetches: AtomicU64::new(0),
            transport_errors: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    /// Records a received publication.
    pub fn record_publication(&self) {
        self.publications_received.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a published reaction.
    pub fn record_published(&self) {
        self.reactions_published.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a dropped reaction.
    pub fn record_dropped(&self) {
        self.reactions_dropped.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a queued reaction.
    pub fn record_queued(&self) {
        self.reactions_queued.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a tally replacement.
    pub fn record_tally_update(&self) {
        self.tally_updates.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a reconnect.
    pub fn record_reconnect(&self) {
        self.reconnects.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a token fetch.
    pub fn record_token_fetch(&self) {
        self.token_fetches.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a transport error.
    pub fn record_transport_error(&self) {
        self.transport_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns publications received.
    #[must_use]
    pub fn publications_received(&self) -> u64 {
        self.publications_received.load(Ordering::Relaxed)
    }

    /// Returns reactions published.
    #[must_use]
    pub fn reactions_published(&self) -> u64 {
        self.reactions_published.load(Ordering::Relaxed)
    }

    /// Returns reactions dropped.
    #[must_use]
    pub fn reactions_dropped(&self) -> u64 {
        self.reactions_dropped.load(Ordering::Relaxed)
    }

    /// Returns reactions queued.
    #[must_use]
    pub fn reactions_queued(&self) -> u64 {
        self.reactions_queued.load(Ordering::Relaxed)
    }

    /// Returns tally replacements.
    #[must_use]
    pub fn tally_updates(&self) -> u64 {
        self.tally_updates.load(Ordering::Relaxed)
    }

    /// Returns reconnects.
    #[must_use]
    pub fn reconnects(&self) -> u64 {
        self.reconnects.load(Ordering::Relaxed)
    }

    /// Returns token fetches.
    #[must_use]
    pub fn token_fetches(&self) -> u64 {
        self.token_fetches.load(Ordering::Relaxed)
    }

    /// Returns transport errors.
    #[must_use]
    pub fn transport_errors(&self) -> u64 {
        self.transport_errors.load(Ordering::Relaxed)
    }

    /// Returns the uptime.
    #[must_use]
    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Returns publications per second.
    #[must_use]
    pub fn publications_per_second(&self) -> f64 {
        let elapsed = self.uptime().as_secs_f64();
        if elapsed > 0.0 {
            self.publications_received() as f64 / elapsed
        } else {
            0.0
        }
    }

    /// Returns a snapshot of all metrics.
    #[must_use]
    pub fn snapshot(&self) -> SessionMetricsSnapshot {
        SessionMetricsSnapshot {
            publications_received: self.publications_received(),
            reactions_published: self.reactions_published(),
            reactions_dropped: self.reactions_dropped(),
            reactions_queued: self.reactions_queued(),
            tally_updates: self.tally_updates(),
            reconnects: self.reconnects(),
            token_fetches: self.token_fetches(),
            transport_errors: self.transport_errors(),
            uptime: self.uptime(),
            publications_per_second: self.publications_per_second(),
        }
    }
}

/// A point-in-time snapshot of session metrics.
#[derive(Debug, Clone)]
pub struct SessionMetricsSnapshot {
    /// Publications received.
    pub publications_received: u64,
    /// Reactions published.
    pub reactions_published: u64,
    /// Reactions dropped.
    pub reactions_dropped: u64,
    /// Reactions queued.
    pub reactions_queued: u64,
    /// Tally replacements.
    pub tally_updates: u64,
    /// Reconnects.
    pub reconnects: u64,
    /// Token fetches.
    pub token_fetches: u64,
    /// Transport errors.
    pub transport_errors: u64,
    /// Uptime.
    pub uptime: Duration,
    /// Publications per second.
    pub publications_per_second: f64,
}
