//! Second tier: pick which documents to read.
//!
//! The oracle sees the full section table from the index and replies with a
//! JSON array of paths. Its reply is normalized here; anything that is not
//! a usable array collapses to the [`NO_DOCUMENT`] sentinel, which sends the
//! request down the ungrounded path instead of failing it.

use anyhow::Result;

use crate::corpus::CorpusIndex;
use crate::models::OracleTurn;
use crate::oracle::Oracle;

/// Router reply meaning "no document applies".
pub const NO_DOCUMENT: &str = "NONE";

/// Most documents a single decision may select.
pub const MAX_DOCUMENTS: usize = 3;

const SYSTEM: &str = "You are a file router for a firm's chatbot.
Given a user's question and a list of available document sections,
pick the file(s) most likely to contain the answer.

RULES:
- Return ONLY a JSON array of file paths, nothing else.
- Pick 1-3 most relevant files. Prefer fewer files.
- If the question is a greeting or general chat, return: [\"NONE\"]
- Do NOT explain your choice.";

/// Asks the oracle which documents answer `question`.
///
/// Returns 1 to 3 paths in the oracle's order, or `["NONE"]`. Paths are not
/// checked against the index or the filesystem.
pub async fn route(oracle: &dyn Oracle, question: &str, index: &CorpusIndex) -> Result<Vec<String>> {
    let prompt = format!(
        "AVAILABLE SECTIONS:
{sections}

USER QUESTION: {question}

Respond with ONLY a JSON array of \"path\" values, e.g. [\"contact.md\", \"about.md\"]",
        sections = index.sections_json(),
    );

    let reply = oracle.complete(SYSTEM, &[OracleTurn::user(prompt)]).await?;
    let paths = parse_reply(&reply);
    tracing::debug!(raw = %reply.trim(), ?paths, "router reply");
    Ok(paths)
}

/// Normalizes a raw router reply into a path list.
pub fn parse_reply(reply: &str) -> Vec<String> {
    let cleaned = reply.replace("```json", "").replace("```", "");

    let paths: Vec<String> = match serde_json::from_str::<serde_json::Value>(cleaned.trim()) {
        Ok(serde_json::Value::Array(items)) => items
            .into_iter()
            .filter_map(|item| match item {
                serde_json::Value::String(s) => Some(s),
                _ => None,
            })
            .take(MAX_DOCUMENTS)
            .collect(),
        _ => Vec::new(),
    };

    if paths.is_empty() {
        vec![NO_DOCUMENT.to_string()]
    } else {
        paths
    }
}

/// True when a decision selects no documents.
pub fn is_no_document(paths: &[String]) -> bool {
    paths.is_empty() || (paths.len() == 1 && paths[0] == NO_DOCUMENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::ScriptedOracle;

    fn none() -> Vec<String> {
        vec![NO_DOCUMENT.to_string()]
    }

    #[test]
    fn test_well_formed_array_passes_through() {
        assert_eq!(
            parse_reply(r#"["about.md","contact.md"]"#),
            vec!["about.md".to_string(), "contact.md".to_string()]
        );
    }

    #[test]
    fn test_code_fences_stripped() {
        let reply = "```json\n[\"hours.md\"]\n```";
        assert_eq!(parse_reply(reply), vec!["hours.md".to_string()]);
        assert_eq!(parse_reply("```[\"fees.md\"]```"), vec!["fees.md".to_string()]);
    }

    #[test]
    fn test_garbage_normalizes_to_none() {
        assert_eq!(parse_reply("I think you want about.md"), none());
        assert_eq!(parse_reply(""), none());
        assert_eq!(parse_reply("[\"unterminated"), none());
    }

    #[test]
    fn test_non_array_normalizes_to_none() {
        assert_eq!(parse_reply(r#"{"path": "about.md"}"#), none());
        assert_eq!(parse_reply(r#""about.md""#), none());
        assert_eq!(parse_reply("42"), none());
    }

    #[test]
    fn test_non_string_items_dropped() {
        assert_eq!(parse_reply(r#"["about.md", 3, null]"#), vec!["about.md".to_string()]);
        assert_eq!(parse_reply("[]"), none());
        assert_eq!(parse_reply("[1, 2]"), none());
    }

    #[test]
    fn test_long_selection_truncated() {
        assert_eq!(
            parse_reply(r#"["a.md", "b.md", "c.md", "d.md"]"#),
            vec!["a.md".to_string(), "b.md".to_string(), "c.md".to_string()]
        );
    }

    #[test]
    fn test_is_no_document() {
        assert!(is_no_document(&[]));
        assert!(is_no_document(&none()));
        assert!(!is_no_document(&["about.md".to_string()]));
        assert!(!is_no_document(&["NONE".to_string(), "about.md".to_string()]));
    }

    #[tokio::test]
    async fn test_route_embeds_sections_and_question() {
        let index = CorpusIndex::from_json(
            r#"{"firm_name": "Harbor Law", "sections": [{"path": "hours.md", "summary": "Office hours"}]}"#,
        )
        .unwrap();
        let oracle = ScriptedOracle::new(["[\"hours.md\"]"]);

        let paths = route(&oracle, "when are you open?", &index).await.unwrap();
        assert_eq!(paths, vec!["hours.md".to_string()]);

        let calls = oracle.calls();
        assert_eq!(calls[0].system, SYSTEM);
        assert_eq!(calls[0].turns.len(), 1);
        assert!(calls[0].turns[0].content.contains("Office hours"));
        assert!(calls[0].turns[0].content.contains("USER QUESTION: when are you open?"));
    }
}
