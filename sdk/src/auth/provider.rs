//! Token providers.
//!
//! Provides the [`TokenProvider`] seam and its HTTP implementation.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::{debug, warn};

use super::config::TokenConfig;
use super::error::AuthError;
use super::token::AuthToken;

/// Source of connection tokens.
///
/// Called once per connection attempt and once per transport-initiated
/// refresh. Implementations must not cache tokens across calls.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// Obtains a fresh token.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Denied`] when access is permanently refused and
    /// [`AuthError::Transient`] for anything worth retrying.
    async fn fetch_token(&self) -> Result<AuthToken, AuthError>;
}

/// Token endpoint response.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    token: String,
}

/// Fetches tokens from an HTTP endpoint.
#[derive(Debug, Clone)]
pub struct HttpTokenProvider {
    config: TokenConfig,
    http: reqwest::Client,
}

impl HttpTokenProvider {
    /// Creates a new provider with the given configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the HTTP client
    /// cannot be created.
    pub fn new(config: TokenConfig) -> Result<Self, AuthError> {
        config.validate()?;

        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .build()
            .map_err(|e| AuthError::InvalidConfig(e.to_string()))?;

        Ok(Self { config, http })
    }

    /// Creates a new provider for the given endpoint URL.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn with_url(url: impl Into<String>) -> Result<Self, AuthError> {
        Self::new(TokenConfig::new(url))
    }

    /// Returns the provider configuration.
    #[must_use]
    pub fn config(&self) -> &TokenConfig {
        &self.config
    }
}

#[async_trait]
impl TokenProvider for HttpTokenProvider {
    async fn fetch_token(&self) -> Result<AuthToken, AuthError> {
        debug!(url = %self.config.url, "requesting connection token");

        let response = self.http.get(&self.config.url).send().await?;
        let status = response.status();

        if status == StatusCode::FORBIDDEN || status == StatusCode::UNAUTHORIZED {
            warn!(status = status.as_u16(), "token endpoint denied access");
            return Err(AuthError::Denied {
                status: status.as_u16(),
            });
        }

        if !status.is_success() {
            return Err(AuthError::Transient(format!(
                "unexpected status code {}",
                status.as_u16()
            )));
        }

        let body = response.text().await?;
        let parsed: TokenResponse = serde_json::from_str(&body)
            .map_err(|e| AuthError::Transient(format!("malformed token response: {}", e)))?;

        if parsed.token.is_empty() {
            return Err(AuthError::Transient("empty token".to_string()));
        }

        Ok(AuthToken::new(parsed.token))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn provider_for(server: &MockServer) -> HttpTokenProvider {
        HttpTokenProvider::with_url(format!("{}/centrifuge/connection_token", server.uri()))
            .expect("provider creation")
    }

    async fn mount(server: &MockServer, response: ResponseTemplate) {
        Mock::given(method("GET"))
            .and(path("/centrifuge/connection_token"))
            .respond_with(response)
            .mount(server)
            .await;
    }

    #[test]
    fn test_provider_invalid_config() {
        assert!(HttpTokenProvider::with_url("").is_err());
        assert!(HttpTokenProvider::with_url("ftp://example.com").is_err());
    }

    #[tokio::test]
    async fn test_fetch_token_success() {
        let server = MockServer::start().await;
        mount(
            &server,
            ResponseTemplate::new(200).set_body_json(serde_json::json!({"token": "abc.def"})),
        )
        .await;

        let token = provider_for(&server)
            .await
            .fetch_token()
            .await
            .expect("token");
        assert_eq!(token.expose(), "abc.def");
    }

    #[tokio::test]
    async fn test_fetch_token_forbidden_is_denied() {
        let server = MockServer::start().await;
        mount(&server, ResponseTemplate::new(403)).await;

        let err = provider_for(&server)
            .await
            .fetch_token()
            .await
            .expect_err("denied");
        assert_eq!(err, AuthError::Denied { status: 403 });
    }

    #[tokio::test]
    async fn test_fetch_token_unauthorized_is_denied() {
        let server = MockServer::start().await;
        mount(&server, ResponseTemplate::new(401)).await;

        let err = provider_for(&server)
            .await
            .fetch_token()
            .await
            .expect_err("denied");
        assert!(err.is_denied());
    }

    #[tokio::test]
    async fn test_fetch_token_server_error_is_transient() {
        let server = MockServer::start().await;
        mount(&server, ResponseTemplate::new(500)).await;

        let err = provider_for(&server)
            .await
            .fetch_token()
            .await
            .expect_err("transient");
        assert_eq!(
            err,
            AuthError::Transient("unexpected status code 500".to_string())
        );
    }

    #[tokio::test]
    async fn test_fetch_token_malformed_body_is_transient() {
        let server = MockServer::start().await;
        mount(&server, ResponseTemplate::new(200).set_body_string("not json")).await;

        let err = provider_for(&server)
            .await
            .fetch_token()
            .await
            .expect_err("transient");
        assert!(matches!(err, AuthError::Transient(_)));
    }

    #[tokio::test]
    async fn test_fetch_token_empty_token_is_transient() {
        let server = MockServer::start().await;
        mount(
            &server,
            ResponseTemplate::new(200).set_body_json(serde_json::json!({"token": ""})),
        )
        .await;

        let err = provider_for(&server)
            .await
            .fetch_token()
            .await
            .expect_err("transient");
        assert_eq!(err, AuthError::Transient("empty token".to_string()));
    }

    #[tokio::test]
    async fn test_fetch_token_each_call_hits_endpoint() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/centrifuge/connection_token"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"token": "t"})),
            )
            .expect(2)
            .mount(&server)
            .await;

        let provider = provider_for(&server).await;
        assert!(provider.fetch_token().await.is_ok());
        assert!(provider.fetch_token().await.is_ok());
    }
}
