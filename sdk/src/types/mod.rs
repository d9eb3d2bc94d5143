//! Core types for the EventPulse SDK.
//!
//! This module provides the session, reaction and tally types shared by the
//! lifecycle components.

pub mod reaction;
pub mod session;
pub mod tally;

pub use reaction::{Reaction, ReactionLog, EMOJI_SET};
pub use session::{EventChannels, EventId, Role, Session};
pub use tally::EmojiTally;
