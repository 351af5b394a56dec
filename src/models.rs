//! Core data types that flow through the answer pipeline.

use serde::{Deserialize, Serialize};

/// A conversation turn as supplied by the chat client.
///
/// The widget labels its own messages `"user"` and the assistant's replies
/// `"bot"`; any other label is accepted and treated as user input.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConversationTurn {
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub content: Option<String>,
}

impl ConversationTurn {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: Some(content.into()),
        }
    }
}

/// Speaker of a turn sent to the oracle.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// A turn in the transcript handed to the oracle after the system instruction.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OracleTurn {
    pub role: Role,
    pub content: String,
}

impl OracleTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Which tier of the pipeline produced an answer.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    /// Answered from the overview document alone.
    FastPath,
    /// Answered from documents selected by the router.
    Grounded,
    /// Router selected nothing; conversational reply without documents.
    Ungrounded,
}

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::FastPath => "fast_path",
            Tier::Grounded => "grounded",
            Tier::Ungrounded => "ungrounded",
        }
    }
}

/// Final result of one pass through the pipeline.
#[derive(Debug, Clone, Serialize)]
pub struct Answer {
    pub reply: String,
    /// Document paths consulted, in router order. Empty unless grounded.
    pub sources: Vec<String>,
    pub tier: Tier,
}
