//! Emoji frequency table.

use indexmap::IndexMap;
use serde::Serialize;

/// Emoji to count mapping computed from one analytics batch, in order of
/// first occurrence.
///
/// A tally is always built whole from a batch; there is no way to merge
/// two tallies or bump a single count from outside.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct EmojiTally {
    counts: IndexMap<String, u64>,
}

impl EmojiTally {
    /// Creates an empty tally.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Counts occurrences of each emoji.
    #[must_use]
    pub fn from_emojis<'a, I>(emojis: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut counts = IndexMap::new();
        for emoji in emojis {
            *counts.entry(emoji.to_string()).or_insert(0) += 1;
        }
        Self { counts }
    }

    /// Returns the count for an emoji (zero when absent).
    #[must_use]
    pub fn get(&self, emoji: &str) -> u64 {
        self.counts.get(emoji).copied().unwrap_or(0)
    }

    /// Returns the number of distinct emoji.
    #[must_use]
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    /// Returns true if the tally has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Returns the sum of all counts.
    #[must_use]
    pub fn total(&self) -> u64 {
        self.counts.values().sum()
    }

    /// Iterates over `(emoji, count)` pairs in order of first occurrence.
    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.counts.iter().map(|(emoji, count)| (emoji.as_str(), *count))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tally_counts() {
        let tally = EmojiTally::from_emojis(["😊", "👍", "😊"]);
        assert_eq!(tally.get("😊"), 2);
        assert_eq!(tally.get("👍"), 1);
        assert_eq!(tally.get("🎉"), 0);
        assert_eq!(tally.len(), 2);
        assert_eq!(tally.total(), 3);
    }

    #[test]
    fn test_tally_keeps_first_occurrence_order() {
        let tally = EmojiTally::from_emojis(["👍", "😊", "👍", "🎉"]);
        let order: Vec<(&str, u64)> = tally.iter().collect();
        assert_eq!(order, vec![("👍", 2), ("😊", 1), ("🎉", 1)]);
    }

    #[test]
    fn test_tally_empty() {
        let tally = EmojiTally::from_emojis(std::iter::empty());
        assert!(tally.is_empty());
        assert_eq!(tally, EmojiTally::new());
    }

    #[test]
    fn test_tally_serialize() {
        let tally = EmojiTally::from_emojis(["👍"]);
        let json = serde_json::to_string(&tally).expect("serialize");
        assert_eq!(json, r#"{"👍":1}"#);
    }
}
