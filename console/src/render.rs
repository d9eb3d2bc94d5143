//! Terminal rendering and input parsing.

use eventpulse_sdk::{EmojiTally, ReactionLog, EMOJI_SET};

/// Renders the reaction log as one line of emoji in arrival order.
#[must_use]
pub fn render_log(log: &ReactionLog) -> String {
    if log.is_empty() {
        return String::new();
    }

    let emojis: Vec<&str> = log.iter().map(|r| r.emoji.as_str()).collect();
    format!("Reactions: {}", emojis.join(" "))
}

/// Renders the host analytics tally as a two-column table.
#[must_use]
pub fn render_tally(tally: &EmojiTally) -> String {
    let mut out = String::from("Host Analytics\n| Emoji | Count |\n|-------|-------|");
    for (emoji, count) in tally.iter() {
        out.push_str(&format!("\n| {} | {} |", emoji, count));
    }
    out
}

/// Returns the prompt listing the available reactions.
#[must_use]
pub fn prompt() -> String {
    let choices: Vec<String> = EMOJI_SET
        .iter()
        .enumerate()
        .map(|(i, emoji)| format!("[{}] {}", i + 1, emoji))
        .collect();
    format!("React with {} (or type an emoji, 'q' to quit)", choices.join(" "))
}

/// What a line of user input asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    /// Publish this emoji.
    React(String),
    /// Leave the event.
    Quit,
    /// Nothing to do.
    Empty,
}

/// Parses a line of user input.
///
/// A number selects from [`EMOJI_SET`]; anything else is sent as typed.
#[must_use]
pub fn parse_input(line: &str) -> Input {
    let line = line.trim();
    if line.is_empty() {
        return Input::Empty;
    }
    if line.eq_ignore_ascii_case("q") || line.eq_ignore_ascii_case("quit") {
        return Input::Quit;
    }

    let picked = line
        .parse::<usize>()
        .ok()
        .and_then(|n| n.checked_sub(1))
        .and_then(|i| EMOJI_SET.get(i));

    match picked {
        Some(emoji) => Input::React((*emoji).to_string()),
        None => Input::React(line.to_string()),
    }
}
