//! Reaction types.
//!
//! Provides the reaction payload and the append-only reaction log.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::session::EventId;

/// Emoji offered to users.
pub const EMOJI_SET: [&str; 2] = ["😊", "👍"];

/// A reaction published on an event channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reaction {
    /// Event the reaction belongs to.
    pub event_id: EventId,

    /// Reaction emoji.
    pub emoji: String,

    /// Reacting user.
    pub user_id: String,
}

impl Reaction {
    /// Creates a new reaction.
    #[must_use]
    pub fn new(event_id: EventId, emoji: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            event_id,
            emoji: emoji.into(),
            user_id: user_id.into(),
        }
    }

    /// Decodes a publication payload without rejecting it.
    ///
    /// Missing fields become empty strings and non-string fields keep their
    /// JSON text. A payload that is not an object is taken as the emoji.
    #[must_use]
    pub fn from_payload(payload: &Value) -> Self {
        if !payload.is_object() {
            return Self::new(EventId::new(String::new()), text(Some(payload)), "");
        }

        Self {
            event_id: EventId::new(text(payload.get("eventId"))),
            emoji: text(payload.get("emoji")),
            user_id: text(payload.get("userId")),
        }
    }
}

fn text(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

/// Reactions in arrival order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReactionLog {
    entries: Vec<Reaction>,
}

impl ReactionLog {
    /// Creates an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a reaction.
    pub fn push(&mut self, reaction: Reaction) {
        self.entries.push(reaction);
    }

    /// Returns the number of reactions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if no reaction arrived yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the reactions in arrival order.
    #[must_use]
    pub fn as_slice(&self) -> &[Reaction] {
        &self.entries
    }

    /// Iterates over the reactions in arrival order.
    pub fn iter(&self) -> impl Iterator<Item = &Reaction> {
        self.entries.iter()
    }

    /// Returns the most recent reaction.
    #[must_use]
    pub fn last(&self) -> Option<&Reaction> {
        self.entries.last()
    }
}
