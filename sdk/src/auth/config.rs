//! Token endpoint configuration.
//!
//! Provides configuration options for the HTTP token provider.

use std::time::Duration;

use super::error::AuthError;

/// Default token endpoint.
pub const DEFAULT_TOKEN_URL: &str = "http://localhost:8000/centrifuge/connection_token";

/// Default request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Token endpoint configuration.
#[derive(Debug, Clone)]
pub struct TokenConfig {
    /// Token endpoint URL.
    pub url: String,

    /// Request timeout.
    pub timeout: Duration,

    /// User agent string.
    pub user_agent: String,
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_TOKEN_URL.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            user_agent: format!("eventpulse-sdk/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl TokenConfig {
    /// Creates a new configuration with the given endpoint URL.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    /// Sets the request timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the user agent.
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn validate(&self) -> Result<(), AuthError> {
        if self.url.is_empty() {
            return Err(AuthError::InvalidConfig("url cannot be empty".to_string()));
        }

        if !self.url.starts_with("http://") && !self.url.starts_with("https://") {
            return Err(AuthError::InvalidConfig(
                "url must start with http:// or https://".to_string(),
            ));
        }

        if self.timeout.is_zero() {
            return Err(AuthError::InvalidConfig(
                "timeout must be > 0".to_string(),
            ));
        }

        Ok(())
    }
}
