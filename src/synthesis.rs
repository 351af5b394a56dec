//! Final tier: write the reply.
//!
//! With documents selected, their full text is placed in the system
//! instruction and the oracle is told to answer from it alone. With none
//! selected, the oracle answers conversationally under a persona that stays
//! on the firm's subject.

use anyhow::Result;

use crate::corpus::Corpus;
use crate::history;
use crate::models::ConversationTurn;
use crate::oracle::Oracle;
use crate::routing::is_no_document;

/// Produces the reply for `question` from the documents at `paths`.
///
/// A path that cannot be read becomes a labelled "(not found)" block; it
/// never fails the call.
pub async fn synthesize(
    oracle: &dyn Oracle,
    question: &str,
    paths: &[String],
    corpus: &Corpus,
    history: &[ConversationTurn],
) -> Result<String> {
    let system = if is_no_document(paths) {
        ungrounded_instruction(corpus.firm_name())
    } else {
        let context = gather_context(corpus, paths).await;
        grounded_instruction(corpus.firm_name(), &context)
    };

    let turns = history::transcript(history, question);
    let reply = oracle.complete(&system, &turns).await?;
    Ok(reply.trim().to_string())
}

/// Concatenates one delimited block per path, in the given order.
pub async fn gather_context(corpus: &Corpus, paths: &[String]) -> String {
    let mut parts = Vec::with_capacity(paths.len());
    for path in paths {
        match corpus.read_document(path).await {
            Some(content) => parts.push(format!("--- FILE: {} ---\n{}\n", path, content)),
            None => parts.push(format!("--- FILE: {} --- (not found)\n", path)),
        }
    }
    parts.join("\n")
}

fn ungrounded_instruction(firm_name: &str) -> String {
    format!(
        "You are a warm, caring assistant for {firm_name}.
You're here to help people who may be dealing with difficult situations.

TONE & STYLE:
- Speak like a kind, knowledgeable friend. Be empathetic, patient, and reassuring.
- Keep things conversational. Avoid sounding robotic or overly formal.
- If they're greeting you, greet them back warmly and let them know you're here to help with any questions about the firm.
- If the question is clearly unrelated to the firm or its practice areas, gently let them know you can only help with questions related to {firm_name}."
    )
}

fn grounded_instruction(firm_name: &str, context: &str) -> String {
    format!(
        "You are a warm, caring assistant for {firm_name}.
Answer the user's question based ONLY on the information provided below.
If the answer is not in the provided content, let them know kindly and suggest they reach out to the firm directly. They'd be happy to help.

TONE & STYLE:
- Speak like a kind, knowledgeable friend who works at the firm.
- Be empathetic. The person may be going through a really tough time; acknowledge that when it feels right.
- Keep things conversational, clear, and reassuring.
- Use bullet points when listing multiple items, but keep it warm.

FIRM INFORMATION:
{context}"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::CorpusIndex;
    use crate::models::OracleTurn;
    use crate::oracle::ScriptedOracle;
    use std::fs;
    use tempfile::TempDir;

    fn corpus_with(files: &[(&str, &str)]) -> (TempDir, Corpus) {
        let tmp = TempDir::new().unwrap();
        for (name, body) in files {
            fs::write(tmp.path().join(name), body).unwrap();
        }
        let index = CorpusIndex::from_json(r#"{"firm_name": "Harbor Family Law"}"#).unwrap();
        let corpus = Corpus::new(tmp.path(), index, "");
        (tmp, corpus)
    }

    #[tokio::test]
    async fn test_missing_file_becomes_placeholder() {
        let (_tmp, corpus) = corpus_with(&[("hours.md", "Mon-Fri 9am-5pm")]);
        let oracle = ScriptedOracle::new(["  We're open weekdays.  "]);
        let paths = vec!["hours.md".to_string(), "parking.md".to_string()];

        let reply = synthesize(&oracle, "when?", &paths, &corpus, &[]).await.unwrap();
        assert_eq!(reply, "We're open weekdays.");

        let system = &oracle.calls()[0].system;
        assert!(system.contains("--- FILE: hours.md ---\nMon-Fri 9am-5pm\n"));
        assert!(system.contains("--- FILE: parking.md --- (not found)"));
        assert!(system.contains("ONLY"));
    }

    #[tokio::test]
    async fn test_blocks_follow_router_order() {
        let (_tmp, corpus) = corpus_with(&[("a.md", "alpha"), ("b.md", "beta")]);
        let context = gather_context(&corpus, &["b.md".to_string(), "a.md".to_string()]).await;
        let b = context.find("FILE: b.md").unwrap();
        let a = context.find("FILE: a.md").unwrap();
        assert!(b < a);
    }

    #[tokio::test]
    async fn test_traversal_path_treated_as_missing() {
        let (_tmp, corpus) = corpus_with(&[]);
        let context = gather_context(&corpus, &["../../etc/passwd".to_string()]).await;
        assert_eq!(context, "--- FILE: ../../etc/passwd --- (not found)\n");
    }

    #[tokio::test]
    async fn test_none_uses_ungrounded_persona() {
        let (_tmp, corpus) = corpus_with(&[("about.md", "secret sauce")]);
        let oracle = ScriptedOracle::new(["Hi! How can I help?", "Hello again."]);
        let history = vec![ConversationTurn::new("bot", "Welcome!")];

        let reply = synthesize(&oracle, "hello", &["NONE".to_string()], &corpus, &history)
            .await
            .unwrap();
        assert_eq!(reply, "Hi! How can I help?");
        synthesize(&oracle, "hello", &[], &corpus, &[]).await.unwrap();

        let calls = oracle.calls();
        assert!(!calls[0].system.contains("FIRM INFORMATION"));
        assert!(calls[0].system.contains("only help with questions related to Harbor Family Law"));
        assert_eq!(
            calls[0].turns,
            vec![OracleTurn::assistant("Welcome!"), OracleTurn::user("hello")]
        );
        assert_eq!(calls[1].turns, vec![OracleTurn::user("hello")]);
    }
}
