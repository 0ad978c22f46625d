//! LLM provider configuration and selection.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::types::{LLMProvider, ResolvedProvider};

pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_ANTHROPIC_MODEL: &str = "claude-sonnet-4-20250514";
pub const DEFAULT_GROQ_MODEL: &str = "llama-3.3-70b-versatile";

/// Provider credentials and model names (read from `llm-config.json`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LLMConfig {
    /// `auto`, `openai`, `anthropic` or `groq`.
    #[serde(default = "default_preferred")]
    pub preferred_provider: String,
    #[serde(default)]
    pub openai_api_key: Option<String>,
    #[serde(default)]
    pub anthropic_api_key: Option<String>,
    #[serde(default)]
    pub groq_api_key: Option<String>,
    #[serde(default = "default_openai_model")]
    pub openai_model: String,
    #[serde(default = "default_anthropic_model")]
    pub anthropic_model: String,
    #[serde(default = "default_groq_model")]
    pub groq_model: String,
}

fn default_preferred() -> String {
    "auto".into()
}
fn default_openai_model() -> String {
    DEFAULT_OPENAI_MODEL.into()
}
fn default_anthropic_model() -> String {
    DEFAULT_ANTHROPIC_MODEL.into()
}
fn default_groq_model() -> String {
    DEFAULT_GROQ_MODEL.into()
}

impl Default for LLMConfig {
    fn default() -> Self {
        Self {
            preferred_provider: default_preferred(),
            openai_api_key: None,
            anthropic_api_key: None,
            groq_api_key: None,
            openai_model: default_openai_model(),
            anthropic_model: default_anthropic_model(),
            groq_model: default_groq_model(),
        }
    }
}

impl LLMConfig {
    /// Load config from file, falling back to env vars and defaults.
    pub fn load(config_path: &Path) -> Self {
        let mut config: LLMConfig = match std::fs::read_to_string(config_path) {
            Ok(raw) => serde_json::from_str(&raw).unwrap_or_else(|e| {
                warn!("Ignoring malformed {}: {}", config_path.display(), e);
                LLMConfig::default()
            }),
            Err(_) => {
                debug!("No LLM config at {}, using env", config_path.display());
                LLMConfig::default()
            }
        };

        // Env vars as fallback for API keys
        if config.openai_api_key.is_none() {
            config.openai_api_key = non_empty_env("OPENAI_API_KEY");
        }
        if config.anthropic_api_key.is_none() {
            config.anthropic_api_key = non_empty_env("ANTHROPIC_API_KEY");
        }
        if config.groq_api_key.is_none() {
            config.groq_api_key = non_empty_env("GROQ_API_KEY");
        }

        config
    }

    /// Resolve which provider and model to use.
    pub fn resolve_provider(&self) -> Option<ResolvedProvider> {
        let pick = |provider: LLMProvider, model: &String, key: &Option<String>| {
            key.as_ref().map(|k| ResolvedProvider {
                provider,
                model: model.clone(),
                api_key: k.clone(),
            })
        };

        match self.preferred_provider.as_str() {
            "openai" => pick(LLMProvider::OpenAI, &self.openai_model, &self.openai_api_key),
            "anthropic" => pick(
                LLMProvider::Anthropic,
                &self.anthropic_model,
                &self.anthropic_api_key,
            ),
            "groq" => pick(LLMProvider::Groq, &self.groq_model, &self.groq_api_key),
            // Auto mode: Anthropic > Groq > OpenAI
            "auto" => pick(
                LLMProvider::Anthropic,
                &self.anthropic_model,
                &self.anthropic_api_key,
            )
            .or_else(|| pick(LLMProvider::Groq, &self.groq_model, &self.groq_api_key))
            .or_else(|| pick(LLMProvider::OpenAI, &self.openai_model, &self.openai_api_key)),
            _ => None,
        }
    }
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auto_prefers_anthropic_then_groq_then_openai() {
        let mut config = LLMConfig {
            openai_api_key: Some("sk-openai".into()),
            ..LLMConfig::default()
        };
        let resolved = config.resolve_provider().unwrap();
        assert_eq!(resolved.provider, LLMProvider::OpenAI);
        assert_eq!(resolved.model, "gpt-4o-mini");

        config.groq_api_key = Some("gsk".into());
        assert_eq!(config.resolve_provider().unwrap().provider, LLMProvider::Groq);

        config.anthropic_api_key = Some("sk-ant".into());
        assert_eq!(
            config.resolve_provider().unwrap().provider,
            LLMProvider::Anthropic
        );
    }

    #[test]
    fn test_explicit_preference_requires_key() {
        let config = LLMConfig {
            preferred_provider: "groq".into(),
            openai_api_key: Some("sk-openai".into()),
            ..LLMConfig::default()
        };
        assert!(config.resolve_provider().is_none());

        let unknown = LLMConfig {
            preferred_provider: "ollama".into(),
            openai_api_key: Some("sk-openai".into()),
            ..LLMConfig::default()
        };
        assert!(unknown.resolve_provider().is_none());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("llm-config.json");
        std::fs::write(
            &path,
            r#"{"preferred_provider": "openai", "openai_api_key": "sk-file", "openai_model": "gpt-4o"}"#,
        )
        .unwrap();

        let config = LLMConfig::load(&path);
        let resolved = config.resolve_provider().unwrap();
        assert_eq!(resolved.api_key, "sk-file");
        assert_eq!(resolved.model, "gpt-4o");
        assert_eq!(config.groq_model, DEFAULT_GROQ_MODEL);
    }
}
