//! Completion request types.

use serde::{Deserialize, Serialize};

/// LLM provider identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LLMProvider {
    OpenAI,
    Anthropic,
    Groq,
}

impl std::fmt::Display for LLMProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LLMProvider::OpenAI => write!(f, "openai"),
            LLMProvider::Anthropic => write!(f, "anthropic"),
            LLMProvider::Groq => write!(f, "groq"),
        }
    }
}

/// A message in the completion request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".into(),
            content: content.into(),
        }
    }
}

/// One non-interactive completion call.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub messages: Vec<ChatMessage>,
    pub temperature: f64,
    pub max_tokens: usize,
}

impl CompletionRequest {
    /// A single user-turn request.
    pub fn from_prompt(prompt: impl Into<String>, temperature: f64, max_tokens: usize) -> Self {
        Self {
            messages: vec![ChatMessage::user(prompt)],
            temperature,
            max_tokens,
        }
    }
}

/// Provider, model and credential chosen from [`crate::LLMConfig`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedProvider {
    pub provider: LLMProvider,
    pub model: String,
    pub api_key: String,
}
