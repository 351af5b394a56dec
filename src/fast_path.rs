//! First tier: answer straight from the overview document.
//!
//! The overview is a short always-loaded summary of the firm. Most greetings
//! and common questions can be answered from it in a single oracle call,
//! skipping routing and document loading. When the oracle judges the overview
//! insufficient it replies with [`NEED_MORE_SENTINEL`].

use anyhow::Result;

use crate::history;
use crate::models::ConversationTurn;
use crate::oracle::Oracle;

/// Reserved reply meaning "the overview does not cover this".
pub const NEED_MORE_SENTINEL: &str = "NEED_MORE_INFO";

/// Result of a fast-path attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FastPath {
    Answered(String),
    NeedMore,
}

/// Tries to answer `question` from `overview` alone.
///
/// Returns [`FastPath::NeedMore`] without calling the oracle when the
/// overview is empty. A whitespace-only overview still goes to the oracle.
pub async fn resolve(
    oracle: &dyn Oracle,
    question: &str,
    overview: &str,
    firm_name: &str,
    history: &[ConversationTurn],
) -> Result<FastPath> {
    if overview.is_empty() {
        return Ok(FastPath::NeedMore);
    }

    let system = instruction(overview, firm_name);
    let turns = history::transcript(history, question);
    let reply = oracle.complete(&system, &turns).await?;

    Ok(classify(&reply))
}

/// Interprets a raw oracle reply.
///
/// The sentinel is matched before anything else and by prefix, so a reply
/// such as `"NEED_MORE_INFO."` still counts as insufficient.
pub fn classify(reply: &str) -> FastPath {
    let trimmed = reply.trim();
    if trimmed.starts_with(NEED_MORE_SENTINEL) {
        FastPath::NeedMore
    } else {
        FastPath::Answered(trimmed.to_string())
    }
}

fn instruction(overview: &str, firm_name: &str) -> String {
    format!(
        "You are a warm, caring assistant for {firm_name}.
You have been given a quick-overview document about the firm.

TONE & STYLE:
- Speak like a kind, knowledgeable friend who works at the firm.
- Be empathetic. The person reaching out may be going through one of the hardest times of their life.
- Keep things conversational and reassuring, not robotic or overly formal.
- Use simple, clear language and avoid excessive jargon.

RULES:
- If the user's question can be FULLY and CONFIDENTLY answered using ONLY the overview below, answer it directly.
- If the message is a greeting or small talk, respond warmly and let them know you're here to help with anything about the firm.
- If the overview does NOT contain enough detail to answer properly, respond with EXACTLY the word: {NEED_MORE_SENTINEL}
- Do NOT guess or make up information beyond what is provided.

FIRM OVERVIEW:
{overview}"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{OracleTurn, Role};
    use crate::oracle::ScriptedOracle;

    #[tokio::test]
    async fn test_empty_overview_skips_oracle() {
        let oracle = ScriptedOracle::default();
        let outcome = resolve(&oracle, "hi", "", "Harbor Law", &[]).await.unwrap();
        assert_eq!(outcome, FastPath::NeedMore);
        assert_eq!(oracle.call_count(), 0);
    }

    #[tokio::test]
    async fn test_whitespace_overview_still_consults_oracle() {
        let oracle = ScriptedOracle::new(["NEED_MORE_INFO"]);
        let outcome = resolve(&oracle, "hi", "  \n", "Harbor Law", &[]).await.unwrap();
        assert_eq!(outcome, FastPath::NeedMore);
        assert_eq!(oracle.call_count(), 1);
    }

    #[test]
    fn test_classify_sentinel_variants() {
        assert_eq!(classify("NEED_MORE_INFO"), FastPath::NeedMore);
        assert_eq!(classify("  NEED_MORE_INFO \n"), FastPath::NeedMore);
        assert_eq!(classify("NEED_MORE_INFO - not in overview"), FastPath::NeedMore);
    }

    #[test]
    fn test_classify_returns_trimmed_answer() {
        assert_eq!(
            classify("  We're open 9 to 5.\n"),
            FastPath::Answered("We're open 9 to 5.".to_string())
        );
        // sentinel only counts at the start
        assert_eq!(
            classify("I'd say NEED_MORE_INFO"),
            FastPath::Answered("I'd say NEED_MORE_INFO".to_string())
        );
    }

    #[tokio::test]
    async fn test_resolve_sends_overview_history_and_question() {
        let oracle = ScriptedOracle::new(["Hello! How can I help?"]);
        let history = vec![
            ConversationTurn::new("user", "earlier"),
            ConversationTurn::new("bot", "earlier reply"),
        ];

        let outcome = resolve(&oracle, "hi", "We handle custody.", "Harbor Law", &history)
            .await
            .unwrap();
        assert_eq!(outcome, FastPath::Answered("Hello! How can I help?".to_string()));

        let calls = oracle.calls();
        assert_eq!(calls.len(), 1);
        assert!(calls[0].system.contains("We handle custody."));
        assert!(calls[0].system.contains("Harbor Law"));
        assert!(calls[0].system.contains(NEED_MORE_SENTINEL));
        assert_eq!(calls[0].turns.len(), 3);
        assert_eq!(calls[0].turns[1].role, Role::Assistant);
        assert_eq!(calls[0].turns[2], OracleTurn::user("hi"));
    }

    #[tokio::test]
    async fn test_resolve_propagates_oracle_failure() {
        let oracle = ScriptedOracle::default();
        oracle.push_failure("connection reset");
        assert!(resolve(&oracle, "hi", "overview", "Firm", &[]).await.is_err());
    }
}
