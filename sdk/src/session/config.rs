//! Session configuration.

use crate::connection::ReconnectPolicy;
use crate::error::SessionError;
use crate::publisher::PublishMode;

/// Default user identifier attached to published reactions.
pub const DEFAULT_USER_ID: &str = "user123";

/// Configuration for an [`super::EventSession`].
#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    /// User identifier stamped on outgoing reactions.
    pub user_id: String,

    /// Backoff for connection attempts.
    pub reconnect: ReconnectPolicy,

    /// Handling of reactions published before the channel is ready.
    pub publish_mode: PublishMode,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            user_id: DEFAULT_USER_ID.to_string(),
            reconnect: ReconnectPolicy::default(),
            publish_mode: PublishMode::default(),
        }
    }
}

impl SessionConfig {
    /// Creates a configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the user identifier.
    #[must_use]
    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = user_id.into();
        self
    }

    /// Sets the reconnect policy.
    #[must_use]
    pub fn with_reconnect_policy(mut self, policy: ReconnectPolicy) -> Self {
        self.reconnect = policy;
        self
    }

    /// Sets the publish mode.
    #[must_use]
    pub fn with_publish_mode(mut self, mode: PublishMode) -> Self {
        self.publish_mode = mode;
        self
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn validate(&self) -> Result<(), SessionError> {
        if self.user_id.trim().is_empty() {
            return Err(SessionError::InvalidConfig(
                "user_id cannot be empty".to_string(),
            ));
        }

        if let PublishMode::QueueUntilSubscribed { max_pending: 0 } = self.publish_mode {
            return Err(SessionError::InvalidConfig(
                "max_pending must be greater than 0".to_string(),
            ));
        }

        self.reconnect.validate()
    }
}
