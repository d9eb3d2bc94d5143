//! In-memory transport and token provider for lifecycle tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;

use crate::auth::{AuthError, AuthToken, TokenProvider};
use crate::transport::{Transport, TransportError, TransportEvent};

/// A call recorded by [`MemoryTransport`].
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Call {
    Connect(String),
    Refresh(String),
    Disconnect,
    Subscribe(String),
    Unsubscribe(String),
    Publish(String, Value),
}

/// Transport that records every call and replays scripted events.
#[derive(Debug)]
pub(crate) struct MemoryTransport {
    calls: Mutex<Vec<Call>>,
    connect_failures: Mutex<VecDeque<TransportError>>,
    subscribe_failures: Mutex<VecDeque<TransportError>>,
    events_tx: mpsc::UnboundedSender<TransportEvent>,
    events_rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<TransportEvent>>,
}

impl MemoryTransport {
    pub(crate) fn new() -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            calls: Mutex::new(Vec::new()),
            connect_failures: Mutex::new(VecDeque::new()),
            subscribe_failures: Mutex::new(VecDeque::new()),
            events_tx,
            events_rx: tokio::sync::Mutex::new(events_rx),
        }
    }

    pub(crate) fn calls(&self) -> Vec<Call> {
        self.calls.lock().expect("calls lock").clone()
    }

    pub(crate) fn count(&self, predicate: impl Fn(&Call) -> bool) -> usize {
        self.calls().iter().filter(|call| predicate(call)).count()
    }

    pub(crate) fn connects(&self) -> usize {
        self.count(|call| matches!(call, Call::Connect(_)))
    }

    pub(crate) fn disconnects(&self) -> usize {
        self.count(|call| matches!(call, Call::Disconnect))
    }

    pub(crate) fn subscribes(&self, channel: &str) -> usize {
        self.count(|call| matches!(call, Call::Subscribe(c) if c == channel))
    }

    pub(crate) fn unsubscribes(&self, channel: &str) -> usize {
        self.count(|call| matches!(call, Call::Unsubscribe(c) if c == channel))
    }

    pub(crate) fn publishes(&self) -> Vec<(String, Value)> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Publish(channel, data) => Some((channel, data)),
                _ => None,
            })
            .collect()
    }

    pub(crate) fn fail_next_connect(&self, err: TransportError) {
        self.connect_failures
            .lock()
            .expect("failures lock")
            .push_back(err);
    }

    pub(crate) fn fail_next_subscribe(&self, err: TransportError) {
        self.subscribe_failures
            .lock()
            .expect("failures lock")
            .push_back(err);
    }

    pub(crate) fn push(&self, event: TransportEvent) {
        self.events_tx.send(event).expect("event receiver alive");
    }

    fn record(&self, call: Call) {
        self.calls.lock().expect("calls lock").push(call);
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn connect(&self, token: &AuthToken) -> Result<(), TransportError> {
        self.record(Call::Connect(token.expose().to_string()));
        match self.connect_failures.lock().expect("failures lock").pop_front() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    async fn refresh(&self, token: &AuthToken) -> Result<(), TransportError> {
        self.record(Call::Refresh(token.expose().to_string()));
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        self.record(Call::Disconnect);
        Ok(())
    }

    async fn subscribe(&self, channel: &str) -> Result<(), TransportError> {
        self.record(Call::Subscribe(channel.to_string()));
        match self.subscribe_failures.lock().expect("failures lock").pop_front() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    async fn unsubscribe(&self, channel: &str) -> Result<(), TransportError> {
        self.record(Call::Unsubscribe(channel.to_string()));
        Ok(())
    }

    async fn publish(&self, channel: &str, data: Value) -> Result<(), TransportError> {
        self.record(Call::Publish(channel.to_string(), data));
        Ok(())
    }

    async fn next_event(&self) -> Option<TransportEvent> {
        self.events_rx.lock().await.recv().await
    }
}

/// Token provider that replays scripted results, then hands out fresh tokens.
#[derive(Debug, Default)]
pub(crate) struct ScriptedTokens {
    script: Mutex<VecDeque<Result<AuthToken, AuthError>>>,
    fetches: AtomicUsize,
}

impl ScriptedTokens {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_script(script: Vec<Result<AuthToken, AuthError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            fetches: AtomicUsize::new(0),
        }
    }

    pub(crate) fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TokenProvider for ScriptedTokens {
    async fn fetch_token(&self) -> Result<AuthToken, AuthError> {
        let n = self.fetches.fetch_add(1, Ordering::SeqCst) + 1;
        match self.script.lock().expect("script lock").pop_front() {
            Some(result) => result,
            None => Ok(AuthToken::new(format!("token-{}", n))),
        }
    }
}

pub(crate) fn denied() -> Result<AuthToken, AuthError> {
    Err(AuthError::Denied { status: 403 })
}

pub(crate) fn transient() -> Result<AuthToken, AuthError> {
    Err(AuthError::Transient("unexpected status code 502".to_string()))
}
