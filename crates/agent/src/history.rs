//! Conversation history window.
//!
//! User turns are appended to the session in arrival order. Only a short
//! suffix is fed back to the model, and never the turn being answered.

use personabot_core::session::{HistoryEntry, SessionState, Speaker};

/// A fixed-size view over the tail of a session's history.
#[derive(Debug, Clone, Copy)]
pub struct HistoryWindow {
    size: usize,
}

impl Default for HistoryWindow {
    fn default() -> Self {
        Self::new(Self::DEFAULT_SIZE)
    }
}

impl HistoryWindow {
    pub const DEFAULT_SIZE: usize = 3;

    pub fn new(size: usize) -> Self {
        Self { size }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Append the turn being answered.
    pub fn record(&self, state: &mut SessionState, text: &str) {
        state.conversation_history.push(HistoryEntry::user(text));
    }

    /// Up to `size` turns preceding the most recent one, oldest first.
    ///
    /// Expects the current turn to have been recorded already.
    pub fn prior_turns<'a>(&self, state: &'a SessionState) -> &'a [HistoryEntry] {
        let history = &state.conversation_history;
        let earlier = &history[..history.len().saturating_sub(1)];
        &earlier[earlier.len().saturating_sub(self.size)..]
    }

    /// Render the prior turns as `User: <text>` lines, or `None` when there are none.
    pub fn render(&self, state: &SessionState) -> Option<String> {
        let turns = self.prior_turns(state);
        if turns.is_empty() {
            return None;
        }

        let lines: Vec<String> = turns
            .iter()
            .map(|entry| {
                let speaker = match entry.speaker {
                    Speaker::User => "User",
                };
                format!("{speaker}: {}", entry.text)
            })
            .collect();
        Some(lines.join("\n"))
    }
}

/// Drop the oldest entries so at most `max` remain.
pub fn cap_history(state: &mut SessionState, max: usize) -> usize {
    let excess = state.conversation_history.len().saturating_sub(max);
    if excess > 0 {
        state.conversation_history.drain(..excess);
    }
    excess
}
