//! Token provider error types.

/// Errors returned when obtaining a connection token.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    /// The token endpoint refused access. Retrying will not help.
    #[error("token request denied ({status})")]
    Denied {
        /// HTTP status returned by the endpoint.
        status: u16,
    },

    /// The token could not be obtained this time.
    #[error("token request failed: {0}")]
    Transient(String),

    /// Invalid configuration.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl AuthError {
    /// Returns true if the caller must stop retrying.
    #[must_use]
    pub const fn is_denied(&self) -> bool {
        matches!(self, Self::Denied { .. })
    }
}

impl From<reqwest::Error> for AuthError {
    fn from(err: reqwest::Error) -> Self {
        Self::Transient(err.to_string())
    }
}
