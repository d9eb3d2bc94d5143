//! Connection lifecycle.
//!
//! [`ConnectionManager`] owns the session's single transport connection. It
//! is the only place that pulls tokens from the [`TokenProvider`] and the
//! only component that moves the connection between states:
//!
//! ```text
//! Disconnected ──connect──▶ Connecting ──ok──▶ Connected
//!                              │  ▲                │
//!                       denied │  └─── transport ──┘
//!                              ▼       disconnect
//!                            Failed
//! ```
//!
//! A transport disconnect does not touch subscriptions; the owner decides
//! what to do with them.

pub mod policy;

use std::fmt;
use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::auth::{AuthError, TokenProvider};
use crate::error::ConnectionError;
use crate::metrics::SessionMetrics;
use crate::transport::{Transport, TransportError};

pub use policy::ReconnectPolicy;

/// Connection state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    /// No connection.
    #[default]
    Disconnected,
    /// Dialing or waiting to redial.
    Connecting,
    /// Authenticated connection is live.
    Connected,
    /// Access was denied; no further attempts will be made.
    Failed,
}

impl ConnectionState {
    /// Returns true if connected.
    #[must_use]
    pub const fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => write!(f, "disconnected"),
            Self::Connecting => write!(f, "connecting"),
            Self::Connected => write!(f, "connected"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Result of a successful `connect` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Connectivity {
    /// The connection just entered `Connected`; subscriptions should be
    /// (re)established.
    Connected,
    /// Nothing happened: the connection was already connecting or connected.
    AlreadyActive,
}

/// Why a single dial attempt failed.
enum AttemptError {
    Denied(AuthError),
    Terminal { code: u32, reason: String },
    Retry(String),
}

/// Owns and drives one transport connection.
pub struct ConnectionManager {
    transport: Arc<dyn Transport>,
    tokens: Arc<dyn TokenProvider>,
    policy: ReconnectPolicy,
    metrics: Arc<SessionMetrics>,
    state_tx: watch::Sender<ConnectionState>,
    connects: u64,
    released: bool,
}

impl fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("state", &self.state())
            .field("policy", &self.policy)
            .field("connects", &self.connects)
            .field("released", &self.released)
            .finish_non_exhaustive()
    }
}

impl ConnectionManager {
    /// Creates a manager for the given transport and token source.
    #[must_use]
    pub fn new(
        transport: Arc<dyn Transport>,
        tokens: Arc<dyn TokenProvider>,
        policy: ReconnectPolicy,
    ) -> Self {
        Self::with_metrics(transport, tokens, policy, Arc::new(SessionMetrics::new()))
    }

    /// Creates a manager that records into shared metrics.
    #[must_use]
    pub fn with_metrics(
        transport: Arc<dyn Transport>,
        tokens: Arc<dyn TokenProvider>,
        policy: ReconnectPolicy,
        metrics: Arc<SessionMetrics>,
    ) -> Self {
        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            transport,
            tokens,
            policy,
            metrics,
            state_tx,
            connects: 0,
            released: false,
        }
    }

    /// Returns the current state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        *self.state_tx.borrow()
    }

    /// Returns a receiver that observes every state transition.
    #[must_use]
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.state_tx.subscribe()
    }

    /// Returns the shared transport.
    #[must_use]
    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    /// Returns true once `disconnect` ran.
    #[must_use]
    pub const fn is_released(&self) -> bool {
        self.released
    }

    /// Connects unless already connecting or connected.
    ///
    /// Each attempt fetches a fresh token. Transient failures are retried
    /// according to the [`ReconnectPolicy`].
    ///
    /// # Errors
    ///
    /// Returns [`ConnectionError::AuthDenied`] if the token endpoint denied
    /// access (now or earlier), [`ConnectionError::Terminated`] if the server
    /// closed the handshake with a no-reconnect code,
    /// [`ConnectionError::RetriesExhausted`] if the policy gave up, and
    /// [`ConnectionError::Released`] after `disconnect`.
    pub async fn connect(&mut self) -> Result<Connectivity, ConnectionError> {
        self.ensure_usable()?;

        match self.state() {
            ConnectionState::Connected | ConnectionState::Connecting => {
                debug!(state = %self.state(), "connect ignored");
                Ok(Connectivity::AlreadyActive)
            }
            _ => self.dial().await,
        }
    }

    /// Handles a transport-level disconnect.
    ///
    /// Returns true if the caller should call [`Self::reconnect`].
    pub fn on_disconnected(&mut self, reason: &str, reconnect: bool) -> bool {
        if self.released || self.state() == ConnectionState::Failed {
            debug!(reason, "disconnect after release or failure ignored");
            return false;
        }

        if !reconnect {
            info!(reason, "server closed the connection for good");
            self.set_state(ConnectionState::Disconnected);
            return false;
        }

        warn!(reason, "connection lost");
        self.set_state(ConnectionState::Connecting);
        true
    }

    /// Redials after a transport-level disconnect.
    ///
    /// # Errors
    ///
    /// Same as [`Self::connect`].
    pub async fn reconnect(&mut self) -> Result<Connectivity, ConnectionError> {
        self.ensure_usable()?;

        if self.state().is_connected() {
            return Ok(Connectivity::AlreadyActive);
        }

        self.dial().await
    }

    /// Answers a transport request for a fresh token.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectionError::AuthDenied`] when the endpoint denied the
    /// refresh; the transport is released and the state becomes `Failed`.
    pub async fn refresh_token(&mut self) -> Result<(), ConnectionError> {
        if self.released || !self.state().is_connected() {
            debug!(state = %self.state(), "token refresh skipped");
            return Ok(());
        }

        self.metrics.record_token_fetch();
        match self.tokens.fetch_token().await {
            Ok(token) => {
                if let Err(err) = self.transport.refresh(&token).await {
                    warn!(error = %err, "transport rejected refreshed token");
                    self.metrics.record_transport_error();
                } else {
                    debug!("connection token refreshed");
                }
                Ok(())
            }
            Err(err) if err.is_denied() => {
                error!(error = %err, "token refresh denied, closing connection");
                if let Err(err) = self.transport.disconnect().await {
                    warn!(error = %err, "transport release failed");
                }
                self.set_state(ConnectionState::Failed);
                Err(ConnectionError::AuthDenied)
            }
            Err(err) => {
                warn!(error = %err, "token refresh failed");
                Ok(())
            }
        }
    }

    /// Releases the transport. Idempotent; runs from any state.
    pub async fn disconnect(&mut self) {
        if self.released {
            debug!("connection already released");
            return;
        }
        self.released = true;

        if let Err(err) = self.transport.disconnect().await {
            warn!(error = %err, "transport release failed");
        }

        if self.state() != ConnectionState::Failed {
            self.set_state(ConnectionState::Disconnected);
        }
        info!("connection released");
    }

    fn ensure_usable(&self) -> Result<(), ConnectionError> {
        if self.released {
            return Err(ConnectionError::Released);
        }
        if self.state() == ConnectionState::Failed {
            return Err(ConnectionError::AuthDenied);
        }
        Ok(())
    }

    async fn dial(&mut self) -> Result<Connectivity, ConnectionError> {
        let mut attempts = 0u32;

        loop {
            attempts = attempts.saturating_add(1);
            self.set_state(ConnectionState::Connecting);

            match self.attempt().await {
                Ok(()) => {
                    self.connects += 1;
                    if self.connects > 1 {
                        self.metrics.record_reconnect();
                    }
                    self.set_state(ConnectionState::Connected);
                    info!(attempts, "connected");
                    return Ok(Connectivity::Connected);
                }
                Err(AttemptError::Denied(err)) => {
                    error!(error = %err, "token endpoint denied access, giving up");
                    self.set_state(ConnectionState::Failed);
                    return Err(ConnectionError::AuthDenied);
                }
                Err(AttemptError::Terminal { code, reason }) => {
                    warn!(code, %reason, "server refused the connection for good");
                    self.set_state(ConnectionState::Disconnected);
                    return Err(ConnectionError::Terminated { code, reason });
                }
                Err(AttemptError::Retry(reason)) => {
                    warn!(attempt = attempts, %reason, "connect attempt failed");
                }
            }

            if !self.policy.allows(attempts) {
                self.set_state(ConnectionState::Disconnected);
                return Err(ConnectionError::RetriesExhausted { attempts });
            }

            let delay = self.policy.delay_for(attempts);
            debug!(?delay, "waiting before next connect attempt");
            tokio::time::sleep(delay).await;
        }
    }

    async fn attempt(&self) -> Result<(), AttemptError> {
        self.metrics.record_token_fetch();
        let token = self.tokens.fetch_token().await.map_err(|err| {
            if err.is_denied() {
                AttemptError::Denied(err)
            } else {
                AttemptError::Retry(err.to_string())
            }
        })?;

        self.transport.connect(&token).await.map_err(|err| {
            self.metrics.record_transport_error();
            match err {
                TransportError::Terminal { code, reason } => AttemptError::Terminal { code, reason },
                other => AttemptError::Retry(other.to_string()),
            }
        })
    }

    fn set_state(&self, state: ConnectionState) {
        let previous = self.state_tx.send_replace(state);
        if previous != state {
            debug!(from = %previous, to = %state, "connection state changed");
        }
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        if self.released {
            return;
        }

        if let Ok(handle) = Handle::try_current() {
            let transport = Arc::clone(&self.transport);
            handle.spawn(async move {
                if let Err(err) = transport.disconnect().await {
                    warn!(error = %err, "transport release on drop failed");
                }
            });
        } else {
            warn!("connection manager dropped outside a runtime, transport not released");
        }
    }
}
