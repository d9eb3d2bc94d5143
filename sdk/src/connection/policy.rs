//! Reconnect policy.
//!
//! Exponential backoff between connection attempts.

use std::time::Duration;

use crate::error::SessionError;

/// Default initial reconnect delay in milliseconds.
pub const DEFAULT_INITIAL_DELAY_MS: u64 = 1_000;

/// Default maximum reconnect delay in milliseconds.
pub const DEFAULT_MAX_DELAY_MS: u64 = 30_000;

/// Default backoff multiplier.
pub const DEFAULT_BACKOFF_MULTIPLIER: f64 = 2.0;

/// Backoff configuration for the connection dial loop.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconnectPolicy {
    /// Delay after the first failed attempt, in milliseconds.
    pub initial_delay_ms: u64,

    /// Upper bound for any delay, in milliseconds.
    pub max_delay_ms: u64,

    /// Growth factor between consecutive delays.
    pub multiplier: f64,

    /// Maximum attempts per dial (None = unlimited).
    pub max_attempts: Option<u32>,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            initial_delay_ms: DEFAULT_INITIAL_DELAY_MS,
            max_delay_ms: DEFAULT_MAX_DELAY_MS,
            multiplier: DEFAULT_BACKOFF_MULTIPLIER,
            max_attempts: None,
        }
    }
}

impl ReconnectPolicy {
    /// Sets the delay bounds.
    #[must_use]
    pub fn with_delays(mut self, initial: Duration, max: Duration) -> Self {
        self.initial_delay_ms = u64::try_from(initial.as_millis()).unwrap_or(u64::MAX);
        self.max_delay_ms = u64::try_from(max.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Sets the backoff multiplier.
    #[must_use]
    pub fn with_multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier;
        self
    }

    /// Sets the maximum attempts per dial.
    #[must_use]
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = Some(attempts);
        self
    }

    /// Returns true if another attempt is allowed after `attempts` failures.
    #[must_use]
    pub fn allows(&self, attempts: u32) -> bool {
        self.max_attempts.map_or(true, |max| attempts < max)
    }

    /// Calculates the delay after the given failed attempt (1-based).
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt.saturating_sub(1)).unwrap_or(i32::MAX);
        let delay = self.initial_delay_ms as f64 * self.multiplier.powi(exponent);
        let delay = (delay as u64).min(self.max_delay_ms);
        Duration::from_millis(delay)
    }

    /// Validates the policy.
    ///
    /// # Errors
    ///
    /// Returns an error if the policy is invalid.
    pub fn validate(&self) -> Result<(), SessionError> {
        if self.initial_delay_ms > self.max_delay_ms {
            return Err(SessionError::InvalidConfig(
                "initial_delay_ms must be <= max_delay_ms".to_string(),
            ));
        }

        if self.multiplier.is_nan() || self.multiplier < 1.0 {
            return Err(SessionError::InvalidConfig(
                "multiplier must be >= 1.0".to_string(),
            ));
        }

        if self.max_attempts == Some(0) {
            return Err(SessionError::InvalidConfig(
                "max_attempts must be > 0".to_string(),
            ));
        }

        Ok(())
    }
}
