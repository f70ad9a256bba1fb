//! Conversation transcript and prompt rendering.
//!
//! The line format is fixed: every completed turn renders as
//! `You: {user}` followed by `Bot: {bot}`, and a prompt ends with the
//! pending message and a bare `Bot:` marker. Text is interpolated verbatim.

use serde::{Deserialize, Serialize};

const USER_PREFIX: &str = "You: ";
const BOT_PREFIX: &str = "Bot: ";
const BOT_MARKER: &str = "Bot:";

/// One completed exchange.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    user_text: String,
    bot_text: String,
}

impl Turn {
    pub fn new(user_text: impl Into<String>, bot_text: impl Into<String>) -> Self {
        Self {
            user_text: user_text.into(),
            bot_text: bot_text.into(),
        }
    }

    pub fn user_text(&self) -> &str {
        &self.user_text
    }

    pub fn bot_text(&self) -> &str {
        &self.bot_text
    }

    fn render_into(&self, out: &mut String) {
        out.push_str(USER_PREFIX);
        out.push_str(&self.user_text);
        out.push('\n');
        out.push_str(BOT_PREFIX);
        out.push_str(&self.bot_text);
    }
}

/// Ordered history of turns, oldest first. Only ever grows.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transcript {
    turns: Vec<Turn>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Turn> {
        self.turns.iter()
    }

    pub fn last(&self) -> Option<&Turn> {
        self.turns.last()
    }

    /// See [`append_turn`].
    #[must_use]
    pub fn append_turn(&self, user_text: &str, bot_text: &str) -> Self {
        append_turn(self, user_text, bot_text)
    }

    /// See [`render_history`].
    pub fn render_history(&self) -> String {
        render_history(self)
    }

    /// See [`render_prompt`].
    pub fn render_prompt(&self, pending_user_text: &str) -> String {
        render_prompt(self, pending_user_text)
    }
}

impl<'a> IntoIterator for &'a Transcript {
    type Item = &'a Turn;
    type IntoIter = std::slice::Iter<'a, Turn>;

    fn into_iter(self) -> Self::IntoIter {
        self.turns.iter()
    }
}

impl FromIterator<Turn> for Transcript {
    fn from_iter<I: IntoIterator<Item = Turn>>(iter: I) -> Self {
        Self {
            turns: iter.into_iter().collect(),
        }
    }
}

/// Render the transcript for display.
///
/// Turns are joined by a single newline; an empty transcript renders as `""`.
pub fn render_history(transcript: &Transcript) -> String {
    let mut out = String::new();
    for (i, turn) in transcript.iter().enumerate() {
        if i > 0 {
            out.push('\n');
        }
        turn.render_into(&mut out);
    }
    out
}

/// Render the prompt sent to the completion service.
///
/// This is the history, a newline, the pending message and the `Bot:` marker.
/// The newline is emitted even when the history is empty, so the first prompt
/// of a session starts with `"\n"`.
pub fn render_prompt(transcript: &Transcript, pending_user_text: &str) -> String {
    let mut out = render_history(transcript);
    out.push('\n');
    out.push_str(USER_PREFIX);
    out.push_str(pending_user_text);
    out.push('\n');
    out.push_str(BOT_MARKER);
    out
}

/// Return a new transcript with one more turn at the end.
///
/// The input is not modified; callers treat it as superseded.
#[must_use]
pub fn append_turn(transcript: &Transcript, user_text: &str, bot_text: &str) -> Transcript {
    let mut turns = Vec::with_capacity(transcript.len() + 1);
    turns.extend(transcript.iter().cloned());
    turns.push(Turn::new(user_text, bot_text));
    Transcript { turns }
}
