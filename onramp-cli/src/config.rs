use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

use crate::state::ensure_onramp_home;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub llm: LlmSection,
    #[serde(default)]
    pub chat: ChatSection,
    #[serde(default)]
    pub knowledge: KnowledgeSection,
    #[serde(default)]
    pub log: LogSection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSection {
    /// Only OpenAI-compatible chat completion endpoints are supported.
    pub provider: String,
    pub model: String,
    pub base_url: String,
    pub temperature: f32,
    /// Tool rounds allowed per user message.
    pub max_iterations: usize,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            model: "gpt-4o-mini".to_string(),
            base_url: "https://api.openai.com".to_string(),
            temperature: 0.1,
            max_iterations: 15,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatSection {
    pub stream: bool,
    /// Most recent transcript messages sent to the model; 0 sends all.
    pub max_turns_context: usize,
}

impl Default for ChatSection {
    fn default() -> Self {
        Self {
            stream: true,
            max_turns_context: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KnowledgeSection {
    /// Vector search service; searches fall back to built-in guidance when unset.
    pub base_url: Option<String>,
    pub top_k: usize,
}

impl Default for KnowledgeSection {
    fn default() -> Self {
        Self {
            base_url: None,
            top_k: onramp_core::knowledge::RESULTS_PER_QUERY,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogSection {
    /// Filter directive used when RUST_LOG is not set.
    pub level: String,
}

impl Default for LogSection {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

pub fn config_path() -> Result<PathBuf> {
    Ok(ensure_onramp_home()?.join("config.toml"))
}

pub fn load_config() -> Result<Config> {
    let p = config_path()?;
    if !p.exists() {
        return Ok(Config::default());
    }
    let s = fs::read_to_string(&p).with_context(|| format!("read {}", p.display()))?;
    parse_config(&s)
}

pub fn parse_config(s: &str) -> Result<Config> {
    toml::from_str(s).context("parse config.toml")
}

pub fn save_config(cfg: &Config) -> Result<()> {
    let p = config_path()?;
    let s = toml::to_string_pretty(cfg).context("serialize config")?;
    fs::write(&p, s).with_context(|| format!("write {}", p.display()))?;
    Ok(())
}

pub fn init_config() -> Result<()> {
    let p = config_path()?;
    if p.exists() {
        println!("Config already exists: {}", p.display());
        return Ok(());
    }
    save_config(&Config::default())?;
    println!("Wrote {}", p.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_keeps_defaults() {
        let cfg = parse_config(
            r#"
[llm]
model = "gpt-4o"

[knowledge]
base_url = "http://localhost:8000"
"#,
        )
        .unwrap();
        assert_eq!(cfg.llm.model, "gpt-4o");
        assert_eq!(cfg.llm.max_iterations, 15);
        assert_eq!(cfg.llm.temperature, 0.1);
        assert!(cfg.chat.stream);
        assert_eq!(cfg.knowledge.base_url.as_deref(), Some("http://localhost:8000"));
        assert_eq!(cfg.knowledge.top_k, 3);
        assert_eq!(cfg.log.level, "info");
    }

    #[test]
    fn test_default_config_round_trips_through_toml() {
        let s = toml::to_string_pretty(&Config::default()).unwrap();
        let cfg = parse_config(&s).unwrap();
        assert_eq!(cfg.llm.provider, "openai");
        assert!(cfg.knowledge.base_url.is_none());
    }

    #[test]
    fn test_empty_file_is_default() {
        let cfg = parse_config("").unwrap();
        assert_eq!(cfg.llm.model, "gpt-4o-mini");
    }
}
