//! Console configuration.
//!
//! Provides the environment-driven configuration of the console host.

use std::time::Duration;

use eventpulse_sdk::auth::config::DEFAULT_TOKEN_URL;
use eventpulse_sdk::session::config::DEFAULT_USER_ID;
use eventpulse_sdk::ws::config::DEFAULT_WS_URL;
use eventpulse_sdk::{
    PublishMode, Session, SessionConfig, SessionError, TokenConfig, WsConfig,
};

/// Hosting page URL carrying `eventId` and `userType`.
pub const EVENT_PAGE_URL: &str = "EVENT_PAGE_URL";

/// WebSocket endpoint.
pub const CENTRIFUGO_WS_URL: &str = "CENTRIFUGO_WS_URL";

/// Token endpoint.
pub const TOKEN_URL: &str = "TOKEN_URL";

/// User identifier stamped on reactions.
pub const USER_ID: &str = "USER_ID";

/// Pending queue bound; enables queue-until-subscribed publishing.
pub const PUBLISH_QUEUE: &str = "PUBLISH_QUEUE";

/// Token request timeout in seconds.
pub const TOKEN_TIMEOUT_SECS: &str = "TOKEN_TIMEOUT_SECS";

/// Default tracing filter when `RUST_LOG` is unset.
pub const DEFAULT_LOG_FILTER: &str = "info,eventpulse_sdk=debug,eventpulse_console=debug";

/// Configuration for the console host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsoleConfig {
    /// Hosting page URL.
    pub page_url: String,

    /// WebSocket endpoint.
    pub ws_url: String,

    /// Token endpoint.
    pub token_url: String,

    /// User identifier.
    pub user_id: String,

    /// Pending queue bound (None = drop reactions while not ready).
    pub publish_queue: Option<usize>,

    /// Token request timeout (None = provider default).
    pub token_timeout: Option<Duration>,
}

impl ConsoleConfig {
    /// Creates a configuration for the given page URL with default endpoints.
    #[must_use]
    pub fn new(page_url: impl Into<String>) -> Self {
        Self {
            page_url: page_url.into(),
            ws_url: DEFAULT_WS_URL.to_string(),
            token_url: DEFAULT_TOKEN_URL.to_string(),
            user_id: DEFAULT_USER_ID.to_string(),
            publish_queue: None,
            token_timeout: None,
        }
    }

    /// Loads the configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is missing or malformed.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Loads the configuration through a variable lookup.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is missing or malformed.
    pub fn from_vars<F>(get: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let page_url = get(EVENT_PAGE_URL)
            .filter(|v| !v.trim().is_empty())
            .ok_or(ConfigError::Missing(EVENT_PAGE_URL))?;

        let mut config = Self::new(page_url);

        if let Some(url) = get(CENTRIFUGO_WS_URL) {
            config.ws_url = url;
        }
        if let Some(url) = get(TOKEN_URL) {
            config.token_url = url;
        }
        if let Some(user_id) = get(USER_ID) {
            config.user_id = user_id;
        }
        if let Some(raw) = get(PUBLISH_QUEUE) {
            config.publish_queue = Some(parse(PUBLISH_QUEUE, &raw)?);
        }
        if let Some(raw) = get(TOKEN_TIMEOUT_SECS) {
            config.token_timeout = Some(Duration::from_secs(parse(TOKEN_TIMEOUT_SECS, &raw)?));
        }

        Ok(config)
    }

    /// Builds the session from the page URL.
    ///
    /// # Errors
    ///
    /// Returns an error if the page URL is malformed or lacks `eventId`.
    pub fn session(&self) -> Result<Session, SessionError> {
        Session::from_page_url(&self.page_url)
    }

    /// Returns the session configuration.
    #[must_use]
    pub fn session_config(&self) -> SessionConfig {
        let mode = self
            .publish_queue
            .map_or(PublishMode::Drop, |max_pending| {
                PublishMode::QueueUntilSubscribed { max_pending }
            });

        SessionConfig::new()
            .with_user_id(self.user_id.as_str())
            .with_publish_mode(mode)
    }

    /// Returns the WebSocket configuration.
    #[must_use]
    pub fn ws_config(&self) -> WsConfig {
        WsConfig::new(self.ws_url.as_str()).with_client_name("eventpulse-console")
    }

    /// Returns the token endpoint configuration.
    #[must_use]
    pub fn token_config(&self) -> TokenConfig {
        let config = TokenConfig::new(self.token_url.as_str());
        match self.token_timeout {
            Some(timeout) => config.with_timeout(timeout),
            None => config,
        }
    }
}

fn parse<T: std::str::FromStr>(name: &'static str, raw: &str) -> Result<T, ConfigError> {
    raw.trim().parse().map_err(|_| ConfigError::Invalid {
        name,
        value: raw.to_string(),
    })
}

/// Configuration errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// A required variable is not set.
    #[error("{0} must be set")]
    Missing(&'static str),

    /// A variable could not be parsed.
    #[error("{name} has an invalid value: {value}")]
    Invalid {
        /// Variable name.
        name: &'static str,
        /// Raw value.
        value: String,
    },
}
