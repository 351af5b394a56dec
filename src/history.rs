//! Converts client-supplied conversation turns into the oracle's transcript.

use crate::models::{ConversationTurn, OracleTurn, Role};

/// Number of most recent turns forwarded to the oracle.
pub const HISTORY_WINDOW: usize = 10;

/// Keeps the last [`HISTORY_WINDOW`] turns, oldest first, mapping the
/// client's `"bot"` label to [`Role::Assistant`] and everything else to
/// [`Role::User`]. Missing content becomes an empty string.
pub fn adapt(history: &[ConversationTurn]) -> Vec<OracleTurn> {
    let start = history.len().saturating_sub(HISTORY_WINDOW);
    history[start..]
        .iter()
        .map(|turn| OracleTurn {
            role: if turn.role == "bot" {
                Role::Assistant
            } else {
                Role::User
            },
            content: turn.content.clone().unwrap_or_default(),
        })
        .collect()
}

/// Adapted history followed by the current question as the final user turn.
pub fn transcript(history: &[ConversationTurn], question: &str) -> Vec<OracleTurn> {
    let mut turns = adapt(history);
    turns.push(OracleTurn::user(question));
    turns
}
