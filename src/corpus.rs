//! The read-only document corpus: the hand-authored index, the overview
//! document, and path resolution under the document root.
//!
//! # Index format
//!
//! ```json
//! {
//!   "firm_name": "Harbor Family Law",
//!   "sections": [
//!     { "path": "about.md", "summary": "Who we are, founding partners" },
//!     { "path": "hours.md", "summary": "Office hours and holiday closures" }
//!   ]
//! }
//! ```
//!
//! Sections may carry extra fields (titles, keywords); they are preserved and
//! shown to the router alongside the summary.
//!
//! Everything here is loaded once at startup and never mutated, so a
//! [`Corpus`] is shared between requests behind an `Arc` without locking.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};

use crate::config::CorpusConfig;

/// Firm name used when the index does not carry one.
pub const DEFAULT_FIRM_NAME: &str = "our firm";

/// One entry of the index: a document path and what it covers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Section {
    pub path: String,
    #[serde(default)]
    pub summary: String,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Parsed `index.json`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CorpusIndex {
    #[serde(default = "default_firm_name")]
    pub firm_name: String,
    #[serde(default)]
    pub sections: Vec<Section>,
}

fn default_firm_name() -> String {
    DEFAULT_FIRM_NAME.to_string()
}

impl CorpusIndex {
    /// Parses index JSON, rejecting empty or duplicate paths.
    pub fn from_json(text: &str) -> Result<Self> {
        let index: CorpusIndex =
            serde_json::from_str(text).context("Failed to parse corpus index JSON")?;

        let mut seen = HashSet::new();
        for section in &index.sections {
            if section.path.trim().is_empty() {
                bail!("corpus index contains a section with an empty path");
            }
            if !seen.insert(section.path.as_str()) {
                bail!("corpus index lists path '{}' more than once", section.path);
            }
        }

        Ok(index)
    }

    /// The section table as pretty-printed JSON, the form the router sees.
    pub fn sections_json(&self) -> String {
        serde_json::to_string_pretty(&self.sections).unwrap_or_else(|_| "[]".to_string())
    }
}

/// Index, overview text and document root, loaded once per process.
#[derive(Debug, Clone)]
pub struct Corpus {
    root: PathBuf,
    index: CorpusIndex,
    overview: String,
}

impl Corpus {
    pub fn new(root: impl Into<PathBuf>, index: CorpusIndex, overview: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            index,
            overview: overview.into(),
        }
    }

    /// Loads the index and overview named in the configuration.
    ///
    /// A missing index is an error; a missing overview yields an empty
    /// overview, which turns the fast path off.
    pub fn load(config: &CorpusConfig) -> Result<Self> {
        let text = std::fs::read_to_string(&config.index).with_context(|| {
            format!("Failed to read corpus index: {}", config.index.display())
        })?;
        let index = CorpusIndex::from_json(&text)?;
        let overview = load_overview(config.overview.as_deref())?;

        tracing::info!(
            firm = %index.firm_name,
            sections = index.sections.len(),
            overview_bytes = overview.len(),
            "corpus loaded"
        );

        Ok(Self::new(config.root.clone(), index, overview))
    }

    pub fn index(&self) -> &CorpusIndex {
        &self.index
    }

    pub fn firm_name(&self) -> &str {
        &self.index.firm_name
    }

    pub fn overview(&self) -> &str {
        &self.overview
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Maps an index-relative path onto the document root.
    ///
    /// Returns `None` for absolute paths and paths with `..` or other
    /// non-normal components, so nothing outside the root is reachable.
    pub fn resolve(&self, relative: &str) -> Option<PathBuf> {
        let candidate = Path::new(relative);
        if relative.is_empty()
            || !candidate
                .components()
                .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
        {
            return None;
        }
        Some(self.root.join(candidate))
    }

    /// Reads a document's full text, or `None` if it is missing or unreadable.
    pub async fn read_document(&self, relative: &str) -> Option<String> {
        let full = self.resolve(relative)?;
        match tokio::fs::read_to_string(&full).await {
            Ok(text) => Some(text),
            Err(e) => {
                tracing::warn!(path = %relative, error = %e, "document unavailable");
                None
            }
        }
    }
}

fn load_overview(path: Option<&Path>) -> Result<String> {
    let Some(path) = path else {
        return Ok(String::new());
    };
    if !path.exists() {
        tracing::info!(path = %path.display(), "no overview document; fast path disabled");
        return Ok(String::new());
    }
    std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read overview document: {}", path.display()))
}
