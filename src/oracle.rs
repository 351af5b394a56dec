//! Text-completion oracle abstraction and implementations.
//!
//! Every tier of the pipeline talks to the language model through the
//! [`Oracle`] trait: one system instruction plus a transcript in, one text
//! reply out. Implementations:
//!
//! - **[`OpenAIOracle`]**: calls an OpenAI-compatible `/chat/completions`
//!   endpoint.
//! - **[`DisabledOracle`]**: fails every call; used when
//!   `oracle.provider = "disabled"`.
//! - **[`ScriptedOracle`]**: replays canned replies and records every call,
//!   for tests and offline demos.
//!
//! No implementation retries. A failed call surfaces as an error and the
//! request that made it is answered with a generic failure message.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::config::OracleConfig;
use crate::models::OracleTurn;

/// The language model, seen as an opaque function from instructions and
/// turns to text.
#[async_trait]
pub trait Oracle: Send + Sync {
    /// Short identifier used in logs (e.g. `"openai:gpt-5-nano"`).
    fn name(&self) -> String;

    /// Returns the model's raw reply to `system` followed by `turns`.
    async fn complete(&self, system: &str, turns: &[OracleTurn]) -> Result<String>;
}

// ============ Disabled Oracle ============

/// An oracle that refuses every call.
pub struct DisabledOracle;

#[async_trait]
impl Oracle for DisabledOracle {
    fn name(&self) -> String {
        "disabled".to_string()
    }

    async fn complete(&self, _system: &str, _turns: &[OracleTurn]) -> Result<String> {
        bail!("Oracle provider is disabled")
    }
}

// ============ OpenAI Oracle ============

/// Oracle backed by an OpenAI-compatible chat-completions API.
pub struct OpenAIOracle {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: String,
}

impl OpenAIOracle {
    /// Builds the client from configuration.
    ///
    /// # Errors
    ///
    /// Fails if the environment variable named by `oracle.api_key_env` is
    /// unset or empty, or the HTTP client cannot be constructed.
    pub fn new(config: &OracleConfig) -> Result<Self> {
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| {
                anyhow::anyhow!("{} environment variable not set", config.api_key_env)
            })?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            endpoint: format!("{}/chat/completions", config.base_url.trim_end_matches('/')),
            model: config.model.clone(),
            api_key,
        })
    }
}

#[async_trait]
impl Oracle for OpenAIOracle {
    fn name(&self) -> String {
        format!("openai:{}", self.model)
    }

    async fn complete(&self, system: &str, turns: &[OracleTurn]) -> Result<String> {
        let body = serde_json::json!({
            "model": self.model,
            "messages": build_messages(system, turns),
        });

        let response = self
            .client
            .post(&self.endpoint)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .context("Oracle request failed")?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            bail!("Oracle API error {}: {}", status, body_text);
        }

        let json: serde_json::Value = response
            .json()
            .await
            .context("Oracle returned a non-JSON body")?;
        parse_chat_response(&json)
    }
}

/// Lays out the system instruction and turns as chat-completions messages.
fn build_messages(system: &str, turns: &[OracleTurn]) -> Vec<serde_json::Value> {
    let mut messages = Vec::with_capacity(turns.len() + 1);
    messages.push(serde_json::json!({ "role": "system", "content": system }));
    for turn in turns {
        messages.push(serde_json::json!({
            "role": turn.role.as_str(),
            "content": turn.content,
        }));
    }
    messages
}

/// Extracts `choices[0].message.content` from a chat-completions response.
fn parse_chat_response(json: &serde_json::Value) -> Result<String> {
    json.get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(|c| c.as_str())
        .map(str::to_string)
        .ok_or_else(|| anyhow::anyhow!("Invalid oracle response: missing choices[0].message.content"))
}

// ============ Scripted Oracle ============

/// One recorded call to a [`ScriptedOracle`].
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub system: String,
    pub turns: Vec<OracleTurn>,
}

/// An oracle that replays queued replies in order and records its inputs.
///
/// When the queue runs dry every further call fails, which doubles as a way
/// to exercise the pipeline's error path.
#[derive(Clone, Default)]
pub struct ScriptedOracle {
    replies: Arc<Mutex<VecDeque<Result<String, String>>>>,
    calls: Arc<Mutex<Vec<RecordedCall>>>,
}

impl ScriptedOracle {
    pub fn new<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let oracle = Self::default();
        for reply in replies {
            oracle.push_reply(reply);
        }
        oracle
    }

    pub fn push_reply(&self, reply: impl Into<String>) {
        self.lock_replies().push_back(Ok(reply.into()));
    }

    /// Queues a failure; the matching call returns an error with `message`.
    pub fn push_failure(&self, message: impl Into<String>) {
        self.lock_replies().push_back(Err(message.into()));
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls
            .lock()
            .map(|c| (*c).clone())
            .unwrap_or_default()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().map(|c| c.len()).unwrap_or_default()
    }

    fn lock_replies(&self) -> std::sync::MutexGuard<'_, VecDeque<Result<String, String>>> {
        self.replies.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl Oracle for ScriptedOracle {
    fn name(&self) -> String {
        "scripted".to_string()
    }

    async fn complete(&self, system: &str, turns: &[OracleTurn]) -> Result<String> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(RecordedCall {
                system: system.to_string(),
                turns: turns.to_vec(),
            });
        }
        match self.lock_replies().pop_front() {
            Some(Ok(reply)) => Ok(reply),
            Some(Err(message)) => bail!("{}", message),
            None => bail!("Scripted oracle has no reply queued"),
        }
    }
}

/// Creates the [`Oracle`] selected by `oracle.provider`.
///
/// | Config Value | Oracle |
/// |-------------|--------|
/// | `"disabled"` | [`DisabledOracle`] |
/// | `"openai"` | [`OpenAIOracle`] |
pub fn create_oracle(config: &OracleConfig) -> Result<Arc<dyn Oracle>> {
    match config.provider.as_str() {
        "disabled" => Ok(Arc::new(DisabledOracle)),
        "openai" => Ok(Arc::new(OpenAIOracle::new(config)?)),
        other => bail!("Unknown oracle provider: {}", other),
    }
}
