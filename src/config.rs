//! TOML configuration parsing and validation.
//!
//! ```toml
//! [corpus]
//! root = "./information"
//! index = "./information/index.json"
//! overview = "./mini-context.md"
//!
//! [oracle]
//! provider = "openai"
//! model = "gpt-5-nano"
//!
//! [admission]
//! per_minute = 15
//! per_hour = 60
//!
//! [server]
//! bind = "127.0.0.1:5000"
//! ```

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub corpus: CorpusConfig,
    #[serde(default)]
    pub oracle: OracleConfig,
    #[serde(default)]
    pub admission: AdmissionConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CorpusConfig {
    /// Directory that index paths are resolved against.
    pub root: PathBuf,
    /// Hand-authored JSON index (firm name + section summaries).
    pub index: PathBuf,
    /// Optional quick-overview document used by the fast path.
    #[serde(default)]
    pub overview: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct OracleConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            base_url: default_base_url(),
            api_key_env: default_api_key_env(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_provider() -> String {
    "openai".to_string()
}
fn default_model() -> String {
    "gpt-5-nano".to_string()
}
fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}
fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}
fn default_timeout_secs() -> u64 {
    60
}

#[derive(Debug, Deserialize, Clone)]
pub struct AdmissionConfig {
    #[serde(default = "default_per_minute")]
    pub per_minute: u32,
    #[serde(default = "default_per_hour")]
    pub per_hour: u32,
    /// Seconds between idle-identity sweeps. `0` disables the sweep.
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
}

impl Default for AdmissionConfig {
    fn default() -> Self {
        Self {
            per_minute: default_per_minute(),
            per_hour: default_per_hour(),
            sweep_interval_secs: default_sweep_interval_secs(),
        }
    }
}

fn default_per_minute() -> u32 {
    15
}
fn default_per_hour() -> u32 {
    60
}
fn default_sweep_interval_secs() -> u64 {
    300
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:5000".to_string()
}

impl OracleConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config = parse_config(&content)?;
    Ok(config.resolve_relative_to(path.parent().unwrap_or_else(|| Path::new("."))))
}

/// Parses and validates configuration text without touching the filesystem.
pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;
    config.validate()?;
    Ok(config)
}

impl Config {
    fn validate(&self) -> Result<()> {
        // Validate admission
        if self.admission.per_minute == 0 {
            anyhow::bail!("admission.per_minute must be > 0");
        }
        if self.admission.per_hour == 0 {
            anyhow::bail!("admission.per_hour must be > 0");
        }
        if self.admission.per_minute > self.admission.per_hour {
            anyhow::bail!(
                "admission.per_minute ({}) must not exceed admission.per_hour ({})",
                self.admission.per_minute,
                self.admission.per_hour
            );
        }

        // Validate oracle
        match self.oracle.provider.as_str() {
            "disabled" | "openai" => {}
            other => anyhow::bail!(
                "Unknown oracle provider: '{}'. Must be disabled or openai.",
                other
            ),
        }
        if self.oracle.is_enabled() {
            if self.oracle.model.trim().is_empty() {
                anyhow::bail!(
                    "oracle.model must be specified when provider is '{}'",
                    self.oracle.provider
                );
            }
            if self.oracle.timeout_secs == 0 {
                anyhow::bail!("oracle.timeout_secs must be > 0");
            }
        }

        Ok(())
    }

    /// Anchors relative corpus paths at the directory holding the config file.
    fn resolve_relative_to(mut self, base: &Path) -> Self {
        let anchor = |p: PathBuf| if p.is_relative() { base.join(p) } else { p };
        self.corpus.root = anchor(self.corpus.root);
        self.corpus.index = anchor(self.corpus.index);
        self.corpus.overview = self.corpus.overview.map(anchor);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
[corpus]
root = "information"
index = "information/index.json"
"#;

    #[test]
    fn test_defaults_applied() {
        let cfg = parse_config(MINIMAL).unwrap();
        assert_eq!(cfg.admission.per_minute, 15);
        assert_eq!(cfg.admission.per_hour, 60);
        assert_eq!(cfg.oracle.provider, "openai");
        assert_eq!(cfg.server.bind, "127.0.0.1:5000");
        assert!(cfg.corpus.overview.is_none());
    }

    #[test]
    fn test_rejects_zero_caps() {
        let text = format!("{}\n[admission]\nper_minute = 0\n", MINIMAL);
        let err = parse_config(&text).unwrap_err();
        assert!(err.to_string().contains("per_minute"));
    }

    #[test]
    fn test_rejects_minute_above_hour() {
        let text = format!("{}\n[admission]\nper_minute = 20\nper_hour = 10\n", MINIMAL);
        assert!(parse_config(&text).is_err());
    }

    #[test]
    fn test_rejects_unknown_provider() {
        let text = format!("{}\n[oracle]\nprovider = \"carrier-pigeon\"\n", MINIMAL);
        let err = parse_config(&text).unwrap_err();
        assert!(err.to_string().contains("Unknown oracle provider"));
    }

    #[test]
    fn test_relative_paths_anchor_at_config_dir() {
        let cfg = parse_config(MINIMAL)
            .unwrap()
            .resolve_relative_to(Path::new("/srv/firm"));
        assert_eq!(cfg.corpus.root, PathBuf::from("/srv/firm/information"));
        assert_eq!(
            cfg.corpus.index,
            PathBuf::from("/srv/firm/information/index.json")
        );
    }
}
