//! Subscription registry.
//!
//! Keeps at most one [`Subscription`] per channel name for the lifetime of a
//! registry. The "connected" notification can fire many times (first connect,
//! every reconnect), so [`SubscriptionRegistry::ensure_subscription`] is keyed
//! by channel name and never builds a second object or sends a second
//! `subscribe` for a channel it already knows.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::transport::Transport;

/// Subscription state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum SubscriptionState {
    /// Not subscribed.
    #[default]
    Unsubscribed,
    /// Subscribe request sent, waiting for the server.
    Subscribing,
    /// Confirmed by the server; publications flow.
    Subscribed,
    /// The server or the transport rejected the subscription.
    Failed,
}

impl fmt::Display for SubscriptionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unsubscribed => write!(f, "unsubscribed"),
            Self::Subscribing => write!(f, "subscribing"),
            Self::Subscribed => write!(f, "subscribed"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Receives the events of one subscription.
pub trait SubscriptionHandler: Send + Sync {
    /// The server confirmed the subscription.
    fn on_subscribed(&mut self, _channel: &str) {}

    /// A publication arrived.
    fn on_publication(&mut self, channel: &str, data: &Value);

    /// The subscription ended.
    fn on_unsubscribed(&mut self, _channel: &str) {}
}

/// Client-side handle for membership in one channel.
pub struct Subscription {
    channel: String,
    state: SubscriptionState,
    interrupted: bool,
    handler: Box<dyn SubscriptionHandler>,
}

impl Subscription {
    fn new(channel: &str, handler: Box<dyn SubscriptionHandler>) -> Self {
        Self {
            channel: channel.to_string(),
            state: SubscriptionState::Unsubscribed,
            interrupted: false,
            handler,
        }
    }

    /// Returns the channel name.
    #[must_use]
    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Returns the current state.
    #[must_use]
    pub const fn state(&self) -> SubscriptionState {
        self.state
    }

    /// Returns true if publications flow on this subscription.
    #[must_use]
    pub fn is_subscribed(&self) -> bool {
        self.state == SubscriptionState::Subscribed
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("channel", &self.channel)
            .field("state", &self.state)
            .field("interrupted", &self.interrupted)
            .finish_non_exhaustive()
    }
}

/// Per-channel subscription registry.
pub struct SubscriptionRegistry {
    transport: Arc<dyn Transport>,
    subscriptions: HashMap<String, Subscription>,
    connected: bool,
    created: usize,
}

impl fmt::Debug for SubscriptionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionRegistry")
            .field("subscriptions", &self.subscriptions)
            .field("connected", &self.connected)
            .field("created", &self.created)
            .finish_non_exhaustive()
    }
}

impl SubscriptionRegistry {
    /// Creates an empty registry over the shared transport.
    #[must_use]
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            subscriptions: HashMap::new(),
            connected: false,
            created: 0,
        }
    }

    /// Returns the subscription for `channel`, creating and subscribing it on
    /// first use.
    ///
    /// `make_handler` only runs when the subscription is created. A failed
    /// subscribe request leaves the subscription in `Failed` without
    /// affecting other channels.
    pub async fn ensure_subscription<F>(&mut self, channel: &str, make_handler: F) -> &Subscription
    where
        F: FnOnce() -> Box<dyn SubscriptionHandler> + Send,
    {
        let (subscription, created) = match self.subscriptions.entry(channel.to_string()) {
            Entry::Occupied(entry) => (entry.into_mut(), false),
            Entry::Vacant(entry) => (entry.insert(Subscription::new(channel, make_handler())), true),
        };

        if !created {
            debug!(channel, state = %subscription.state, "subscription already exists");
            return subscription;
        }

        self.created += 1;
        info!(channel, "new subscription");
        subscription.state = SubscriptionState::Subscribing;
        if let Err(err) = self.transport.subscribe(channel).await {
            warn!(channel, error = %err, "subscribe request failed");
            subscription.state = SubscriptionState::Failed;
        }

        subscription
    }

    /// Returns the subscription for `channel`, if one was created.
    #[must_use]
    pub fn get(&self, channel: &str) -> Option<&Subscription> {
        self.subscriptions.get(channel)
    }

    /// Returns the state of `channel` (`Unsubscribed` when never created).
    #[must_use]
    pub fn state(&self, channel: &str) -> SubscriptionState {
        self.get(channel)
            .map_or(SubscriptionState::Unsubscribed, Subscription::state)
    }

    /// Returns true if `channel` is subscribed.
    #[must_use]
    pub fn is_subscribed(&self, channel: &str) -> bool {
        self.state(channel) == SubscriptionState::Subscribed
    }

    /// Returns true if a subscription object exists for `channel`.
    #[must_use]
    pub fn contains(&self, channel: &str) -> bool {
        self.subscriptions.contains_key(channel)
    }

    /// Returns the number of subscription objects.
    #[must_use]
    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }

    /// Returns true if no subscription was created.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }

    /// Returns how many subscription objects were ever constructed.
    #[must_use]
    pub const fn created(&self) -> usize {
        self.created
    }

    /// Returns the channel names in no particular order.
    pub fn channels(&self) -> impl Iterator<Item = &str> {
        self.subscriptions.keys().map(String::as_str)
    }

    /// Marks the connection live and resubscribes interrupted subscriptions
    /// on their existing objects.
    pub async fn on_connected(&mut self) {
        self.connected = true;

        for (channel, subscription) in self.subscriptions.iter_mut() {
            if !subscription.interrupted {
                continue;
            }
            subscription.interrupted = false;

            debug!(channel = %channel, "resubscribing after reconnect");
            if let Err(err) = self.transport.subscribe(channel).await {
                warn!(channel = %channel, error = %err, "resubscribe request failed");
                subscription.state = SubscriptionState::Failed;
            }
        }
    }

    /// Marks live subscriptions as interrupted after a transport disconnect.
    pub fn on_connection_lost(&mut self) {
        self.connected = false;

        for subscription in self.subscriptions.values_mut() {
            if matches!(
                subscription.state,
                SubscriptionState::Subscribing | SubscriptionState::Subscribed
            ) {
                subscription.state = SubscriptionState::Subscribing;
                subscription.interrupted = true;
            }
        }
    }

    /// Applies a server subscribe confirmation.
    ///
    /// Ignored unless the connection is live and the subscription is waiting.
    pub fn on_subscribed(&mut self, channel: &str) -> bool {
        if !self.connected {
            warn!(channel, "subscribe confirmation while disconnected ignored");
            return false;
        }

        match self.subscriptions.get_mut(channel) {
            Some(subscription) if subscription.state == SubscriptionState::Subscribing => {
                subscription.state = SubscriptionState::Subscribed;
                info!(channel, "subscribed");
                subscription.handler.on_subscribed(channel);
                true
            }
            Some(subscription) => {
                debug!(channel, state = %subscription.state, "unexpected subscribe confirmation");
                false
            }
            None => {
                debug!(channel, "subscribe confirmation for unknown channel");
                false
            }
        }
    }

    /// Applies a server subscribe rejection.
    pub fn on_subscribe_failed(&mut self, channel: &str, reason: &str) {
        if let Some(subscription) = self.subscriptions.get_mut(channel) {
            warn!(channel, reason, "subscription rejected");
            subscription.state = SubscriptionState::Failed;
            subscription.interrupted = false;
        }
    }

    /// Applies a server-side unsubscribe.
    pub fn on_unsubscribed(&mut self, channel: &str) {
        match self.subscriptions.get_mut(channel) {
            Some(subscription) if subscription.state != SubscriptionState::Unsubscribed => {
                subscription.state = SubscriptionState::Unsubscribed;
                subscription.interrupted = false;
                info!(channel, "unsubscribed");
                subscription.handler.on_unsubscribed(channel);
            }
            _ => debug!(channel, "unsubscribe for inactive channel ignored"),
        }
    }

    /// Routes a publication to the channel's handler.
    ///
    /// Returns false if the channel is unknown or not subscribed.
    pub fn on_publication(&mut self, channel: &str, data: &Value) -> bool {
        match self.subscriptions.get_mut(channel) {
            Some(subscription) if subscription.state == SubscriptionState::Subscribed => {
                subscription.handler.on_publication(channel, data);
                true
            }
            _ => {
                debug!(channel, "publication for inactive channel dropped");
                false
            }
        }
    }

    /// Unsubscribes every subscription this registry created.
    ///
    /// Safe to call repeatedly and when nothing was ever created. Transport
    /// failures are logged; the subscription is considered gone either way.
    pub async fn teardown(&mut self) {
        for (channel, subscription) in self.subscriptions.iter_mut() {
            if subscription.state == SubscriptionState::Unsubscribed {
                continue;
            }

            if let Err(err) = self.transport.unsubscribe(channel).await {
                warn!(channel = %channel, error = %err, "unsubscribe failed");
            }
            subscription.state = SubscriptionState::Unsubscribed;
            subscription.interrupted = false;
            subscription.handler.on_unsubscribed(channel);
        }

        self.connected = false;
        debug!(subscriptions = self.subscriptions.len(), "registry torn down");
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use super::*;
    use crate::testing::MemoryTransport;
    use crate::transport::TransportError;
    use serde_json::json;

    const CHANNEL: &str = "event-channel-42";

    #[derive(Debug, Default)]
    struct Recorded {
        subscribed: AtomicUsize,
        unsubscribed: AtomicUsize,
        payloads: Mutex<Vec<Value>>,
    }

    struct RecordingHandler(Arc<Recorded>);

    impl SubscriptionHandler for RecordingHandler {
        fn on_subscribed(&mut self, _channel: &str) {
            self.0.subscribed.fetch_add(1, Ordering::SeqCst);
        }

        fn on_publication(&mut self, _channel: &str, data: &Value) {
            self.0.payloads.lock().expect("lock").push(data.clone());
        }

        fn on_unsubscribed(&mut self, _channel: &str) {
            self.0.unsubscribed.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn setup() -> (Arc<MemoryTransport>, SubscriptionRegistry, Arc<Recorded>) {
        let transport = Arc::new(MemoryTransport::new());
        let registry = SubscriptionRegistry::new(Arc::clone(&transport) as Arc<dyn Transport>);
        (transport, registry, Arc::new(Recorded::default()))
    }

    fn handler(recorded: &Arc<Recorded>) -> impl FnOnce() -> Box<dyn SubscriptionHandler> + Send {
        let recorded = Arc::clone(recorded);
        move || Box::new(RecordingHandler(recorded)) as Box<dyn SubscriptionHandler>
    }

    #[tokio::test]
    async fn test_ensure_subscription_is_idempotent() {
        let (transport, mut registry, recorded) = setup();
        registry.on_connected().await;

        let state = registry
            .ensure_subscription(CHANNEL, handler(&recorded))
            .await
            .state();
        assert_eq!(state, SubscriptionState::Subscribing);

        let built = AtomicUsize::new(0);
        let again = registry
            .ensure_subscription(CHANNEL, || {
                built.fetch_add(1, Ordering::SeqCst);
                Box::new(RecordingHandler(Arc::clone(&recorded))) as Box<dyn SubscriptionHandler>
            })
            .await;
        assert_eq!(again.channel(), CHANNEL);

        assert_eq!(built.load(Ordering::SeqCst), 0);
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.created(), 1);
        assert_eq!(transport.subscribes(CHANNEL), 1);
    }

    #[tokio::test]
    async fn test_subscribed_and_publication_flow() {
        let (_transport, mut registry, recorded) = setup();
        registry.on_connected().await;
        registry.ensure_subscription(CHANNEL, handler(&recorded)).await;

        assert!(!registry.on_publication(CHANNEL, &json!({"emoji": "😊"})));
        assert!(registry.on_subscribed(CHANNEL));
        assert!(registry.is_subscribed(CHANNEL));
        assert!(registry.on_publication(CHANNEL, &json!({"emoji": "👍"})));

        assert_eq!(recorded.subscribed.load(Ordering::SeqCst), 1);
        assert_eq!(
            *recorded.payloads.lock().expect("lock"),
            vec![json!({"emoji": "👍"})]
        );
    }

    #[tokio::test]
    async fn test_no_subscribed_before_connected() {
        let (_transport, mut registry, recorded) = setup();
        registry.ensure_subscription(CHANNEL, handler(&recorded)).await;

        assert!(!registry.on_subscribed(CHANNEL));
        assert_eq!(registry.state(CHANNEL), SubscriptionState::Subscribing);
    }

    #[tokio::test]
    async fn test_subscribe_request_failure_is_scoped() {
        let (transport, mut registry, recorded) = setup();
        registry.on_connected().await;
        transport.fail_next_subscribe(TransportError::NotConnected);

        let state = registry
            .ensure_subscription("a", handler(&recorded))
            .await
            .state();
        assert_eq!(state, SubscriptionState::Failed);

        let state = registry
            .ensure_subscription("b", handler(&recorded))
            .await
            .state();
        assert_eq!(state, SubscriptionState::Subscribing);
    }

    #[tokio::test]
    async fn test_subscribe_rejected_by_server() {
        let (_transport, mut registry, recorded) = setup();
        registry.on_connected().await;
        registry.ensure_subscription(CHANNEL, handler(&recorded)).await;

        registry.on_subscribe_failed(CHANNEL, "permission denied");
        assert_eq!(registry.state(CHANNEL), SubscriptionState::Failed);
        assert!(!registry.on_subscribed(CHANNEL));
    }

    #[tokio::test]
    async fn test_reconnect_resubscribes_same_object() {
        let (transport, mut registry, recorded) = setup();
        registry.on_connected().await;
        registry.ensure_subscription(CHANNEL, handler(&recorded)).await;
        registry.on_subscribed(CHANNEL);

        registry.on_connection_lost();
        assert_eq!(registry.state(CHANNEL), SubscriptionState::Subscribing);

        registry.on_connected().await;
        registry.ensure_subscription(CHANNEL, handler(&recorded)).await;
        assert!(registry.on_subscribed(CHANNEL));

        assert_eq!(registry.created(), 1);
        assert_eq!(transport.subscribes(CHANNEL), 2);
        assert_eq!(recorded.subscribed.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_repeated_connected_without_disconnect_does_not_resubscribe() {
        let (transport, mut registry, recorded) = setup();
        registry.on_connected().await;
        registry.ensure_subscription(CHANNEL, handler(&recorded)).await;

        registry.on_connected().await;
        registry.ensure_subscription(CHANNEL, handler(&recorded)).await;

        assert_eq!(transport.subscribes(CHANNEL), 1);
    }

    #[tokio::test]
    async fn test_teardown_unsubscribes_once() {
        let (transport, mut registry, recorded) = setup();
        registry.on_connected().await;
        registry.ensure_subscription(CHANNEL, handler(&recorded)).await;
        registry.on_subscribed(CHANNEL);

        registry.teardown().await;
        registry.teardown().await;
        registry.on_unsubscribed(CHANNEL);

        assert_eq!(transport.unsubscribes(CHANNEL), 1);
        assert_eq!(recorded.unsubscribed.load(Ordering::SeqCst), 1);
        assert_eq!(registry.state(CHANNEL), SubscriptionState::Unsubscribed);
        assert!(!registry.on_publication(CHANNEL, &json!({})));
    }

    #[tokio::test]
    async fn test_teardown_without_subscriptions() {
        let (transport, mut registry, _recorded) = setup();
        registry.teardown().await;
        registry.teardown().await;
        assert!(registry.is_empty());
        assert!(transport.calls().is_empty());
    }

    #[tokio::test]
    async fn test_server_unsubscribe() {
        let (_transport, mut registry, recorded) = setup();
        registry.on_connected().await;
        registry.ensure_subscription(CHANNEL, handler(&recorded)).await;
        registry.on_subscribed(CHANNEL);

        registry.on_unsubscribed(CHANNEL);
        assert_eq!(registry.state(CHANNEL), SubscriptionState::Unsubscribed);
        assert_eq!(recorded.unsubscribed.load(Ordering::SeqCst), 1);
        assert!(registry.contains(CHANNEL));
    }

    #[test]
    fn test_state_for_unknown_channel() {
        let (_transport, registry, _recorded) = setup();
        assert_eq!(registry.state("nope"), SubscriptionState::Unsubscribed);
        assert!(registry.get("nope").is_none());
    }
}
