//! The tiered answer pipeline.
//!
//! ```text
//!  question + history
//!         │
//!         ▼
//!  ┌──────────────┐  answered
//!  │  fast path   │──────────────▶ reply (no sources)
//!  └──────┬───────┘
//!         │ NEED_MORE
//!         ▼
//!  ┌──────────────┐   ["NONE"]    ┌──────────────┐
//!  │    router    │──────────────▶│  ungrounded  │──▶ reply (no sources)
//!  └──────┬───────┘               └──────────────┘
//!         │ paths
//!         ▼
//!  ┌──────────────┐
//!  │   grounded   │──────────────▶ reply + sources
//!  └──────────────┘
//! ```
//!
//! Admission control is not part of the pipeline; the server applies it
//! before calling [`Pipeline::answer`].

use anyhow::Result;
use std::sync::Arc;

use crate::corpus::Corpus;
use crate::fast_path::{self, FastPath};
use crate::models::{Answer, ConversationTurn, Tier};
use crate::oracle::Oracle;
use crate::routing;
use crate::synthesis;

/// Shared, read-only handle to the corpus and the oracle.
#[derive(Clone)]
pub struct Pipeline {
    corpus: Arc<Corpus>,
    oracle: Arc<dyn Oracle>,
}

impl Pipeline {
    pub fn new(corpus: Arc<Corpus>, oracle: Arc<dyn Oracle>) -> Self {
        Self { corpus, oracle }
    }

    pub fn corpus(&self) -> &Corpus {
        &self.corpus
    }

    pub fn oracle_name(&self) -> String {
        self.oracle.name()
    }

    /// Answers one question, trying the cheapest tier first.
    ///
    /// Errors only when an oracle call fails; malformed router output and
    /// missing documents degrade instead.
    pub async fn answer(&self, question: &str, history: &[ConversationTurn]) -> Result<Answer> {
        let oracle = self.oracle.as_ref();
        let corpus = self.corpus.as_ref();

        let quick = fast_path::resolve(
            oracle,
            question,
            corpus.overview(),
            corpus.firm_name(),
            history,
        )
        .await?;
        if let FastPath::Answered(reply) = quick {
            return Ok(Answer {
                reply,
                sources: Vec::new(),
                tier: Tier::FastPath,
            });
        }

        let paths = routing::route(oracle, question, corpus.index()).await?;
        let reply = synthesis::synthesize(oracle, question, &paths, corpus, history).await?;

        if routing::is_no_document(&paths) {
            Ok(Answer {
                reply,
                sources: Vec::new(),
                tier: Tier::Ungrounded,
            })
        } else {
            Ok(Answer {
                reply,
                sources: paths,
                tier: Tier::Grounded,
            })
        }
    }
}
