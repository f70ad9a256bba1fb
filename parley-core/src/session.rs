//! In-memory chat session.

use crate::conversation::{append_turn, Transcript};
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// One user session. Owns its transcript; nothing is persisted.
///
/// The UI layer holds the session and hands `&mut Session` to the chat
/// engine for each turn, so at most one request runs against it at a time.
#[derive(Debug, Clone)]
pub struct Session {
    id: Uuid,
    created_at: DateTime<Utc>,
    transcript: Transcript,
}

impl Session {
    /// Create a session with an empty transcript.
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            transcript: Transcript::new(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    /// Number of completed turns.
    pub fn turn_count(&self) -> usize {
        self.transcript.len()
    }

    /// Record a completed turn, superseding the previous transcript value.
    pub(crate) fn commit_turn(&mut self, user_text: &str, bot_text: &str) {
        self.transcript = append_turn(&self.transcript, user_text, bot_text);
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}
