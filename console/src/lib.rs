//! EventPulse Console - terminal host for one event session.
//!
//! Mounts an [`eventpulse_sdk::EventSession`] from environment
//! configuration, prints the reaction log and (for hosts) the analytics
//! tally, and publishes emoji typed on stdin.
//!
//! # Components
//!
//! - [`config`]: Environment configuration
//! - [`render`]: Terminal output and input parsing

pub mod config;
pub mod render;

pub use config::{ConfigError, ConsoleConfig};
pub use render::{parse_input, render_log, render_tally, Input};
