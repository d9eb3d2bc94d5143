//! Connection token acquisition.
//!
//! This module provides the [`TokenProvider`] seam the connection manager
//! pulls credentials from, and an HTTP implementation backed by `reqwest`.
//!
//! # Example
//!
//! ```rust,ignore
//! use eventpulse_sdk::auth::{HttpTokenProvider, TokenProvider};
//!
//! let provider = HttpTokenProvider::with_url("http://localhost:8000/centrifuge/connection_token")?;
//! let token = provider.fetch_token().await?;
//! ```

pub mod config;
pub mod error;
pub mod provider;
pub mod token;

pub use config::TokenConfig;
pub use error::AuthError;
pub use provider::{HttpTokenProvider, TokenProvider};
pub use token::AuthToken;
