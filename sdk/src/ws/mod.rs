//! WebSocket transport.
//!
//! This module provides [`WsTransport`], a [`crate::transport::Transport`]
//! that talks to a Centrifugo server over WebSocket using the JSON client
//! protocol.
//!
//! # Example
//!
//! ```rust,ignore
//! use eventpulse_sdk::auth::AuthToken;
//! use eventpulse_sdk::transport::Transport;
//! use eventpulse_sdk::ws::WsTransport;
//!
//! let transport = WsTransport::with_url("ws://localhost:8000/connection/websocket")?;
//! transport.connect(&AuthToken::new(token)).await?;
//! transport.subscribe("event-channel-42").await?;
//!
//! while let Some(event) = transport.next_event().await {
//!     println!("Received: {:?}", event);
//! }
//! ```

pub mod client;
pub mod config;
pub mod messages;

pub use client::WsTransport;
pub use config::WsConfig;
