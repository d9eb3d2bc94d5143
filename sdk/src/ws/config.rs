//! WebSocket configuration.
//!
//! Provides configuration options for the WebSocket transport.

use std::time::Duration;

use crate::transport::TransportError;

/// Default WebSocket URL.
pub const DEFAULT_WS_URL: &str = "ws://localhost:8000/connection/websocket";

/// Default time to wait for a command reply, in seconds.
pub const DEFAULT_REPLY_TIMEOUT_SECS: u64 = 10;

/// Default client name sent in the connect command.
pub const DEFAULT_CLIENT_NAME: &str = "eventpulse";

/// Default capacity of the event queue.
pub const DEFAULT_EVENT_BUFFER: usize = 1000;

/// WebSocket configuration.
#[derive(Debug, Clone)]
pub struct WsConfig {
    /// WebSocket URL.
    pub url: String,

    /// Time to wait for connect and refresh replies.
    pub reply_timeout: Duration,

    /// Client name reported to the server.
    pub client_name: Option<String>,

    /// Capacity of the event queue read by `next_event`.
    pub event_buffer: usize,
}

impl Default for WsConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_WS_URL.to_string(),
            reply_timeout: Duration::from_secs(DEFAULT_REPLY_TIMEOUT_SECS),
            client_name: Some(DEFAULT_CLIENT_NAME.to_string()),
            event_buffer: DEFAULT_EVENT_BUFFER,
        }
    }
}

impl WsConfig {
    /// Creates a new configuration with the given URL.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    /// Sets the reply timeout.
    #[must_use]
    pub fn with_reply_timeout(mut self, timeout: Duration) -> Self {
        self.reply_timeout = timeout;
        self
    }

    /// Sets the client name.
    #[must_use]
    pub fn with_client_name(mut self, name: impl Into<String>) -> Self {
        self.client_name = Some(name.into());
        self
    }

    /// Sets the event queue capacity.
    #[must_use]
    pub fn with_event_buffer(mut self, capacity: usize) -> Self {
        self.event_buffer = capacity;
        self
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn validate(&self) -> Result<(), TransportError> {
        if self.url.is_empty() {
            return Err(TransportError::InvalidConfig(
                "url cannot be empty".to_string(),
            ));
        }

        if !self.url.starts_with("ws://") && !self.url.starts_with("wss://") {
            return Err(TransportError::InvalidConfig(
                "url must start with ws:// or wss://".to_string(),
            ));
        }

        if self.reply_timeout.is_zero() {
            return Err(TransportError::InvalidConfig(
                "reply_timeout must be greater than 0".to_string(),
            ));
        }

        if self.event_buffer == 0 {
            return Err(TransportError::InvalidConfig(
                "event_buffer must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}
