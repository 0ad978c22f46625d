//! Generation orchestrator: one model call per proposal.
//!
//! Builds the prompt, invokes the language model and interprets the reply.
//! A reply that is not a well-formed proposal never fails the request: it
//! becomes [`Generation::Degraded`]. Model invocation errors propagate.

use std::collections::BTreeSet;
use std::sync::Arc;

use proposal_chat::{CompletionRequest, LanguageModel};
use proposal_core::Result;
use proposal_ingest::Locale;
use tracing::{debug, info, warn};

use crate::prompt::build_prompt;
use crate::types::{ProposalDocument, RawSources, SectionKey, FALLBACK_SOURCE};

/// Outcome of interpreting a model reply.
#[derive(Debug, Clone, PartialEq)]
pub enum Generation {
    /// The reply parsed into a proposal (Sources synthesized if absent).
    Structured(ProposalDocument),
    /// The reply was not JSON or did not fit the proposal schema.
    Degraded { raw_text: String },
}

impl Generation {
    pub fn is_degraded(&self) -> bool {
        matches!(self, Self::Degraded { .. })
    }

    /// The document to render.
    pub fn into_document(self) -> ProposalDocument {
        match self {
            Self::Structured(doc) => doc,
            Self::Degraded { raw_text } => ProposalDocument::degraded(&raw_text),
        }
    }
}

pub struct GenerationOrchestrator {
    model: Arc<dyn LanguageModel>,
    temperature: f64,
    max_tokens: usize,
}

impl GenerationOrchestrator {
    pub fn new(model: Arc<dyn LanguageModel>, temperature: f64, max_tokens: usize) -> Self {
        Self {
            model,
            temperature,
            max_tokens,
        }
    }

    /// Ask the model for a proposal grounded in `context`.
    pub async fn generate(
        &self,
        context: &str,
        brief: &str,
        locale: Locale,
        allowed_sources: &BTreeSet<String>,
    ) -> Result<Generation> {
        let prompt = build_prompt(context, brief, locale, allowed_sources);
        debug!(
            "Prompt: {} chars, {} allowed sources, language {}",
            prompt.len(),
            allowed_sources.len(),
            locale
        );

        let request = CompletionRequest::from_prompt(prompt, self.temperature, self.max_tokens);
        let reply = self.model.complete(&request).await?;
        info!(
            "Model {} replied with {} chars",
            self.model.model_name(),
            reply.len()
        );

        Ok(interpret_response(&reply))
    }
}

/// Remove a surrounding ```` ```json ```` or bare ```` ``` ```` fence.
pub fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest
        .strip_prefix("json")
        .or_else(|| rest.strip_prefix("JSON"))
        .unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

/// Parse a model reply into a [`Generation`].
pub fn interpret_response(raw: &str) -> Generation {
    let degraded = || Generation::Degraded {
        raw_text: raw.to_string(),
    };

    let value: serde_json::Value = match serde_json::from_str(strip_code_fence(raw)) {
        Ok(v) => v,
        Err(e) => {
            warn!("Model reply is not JSON ({}), using degraded proposal", e);
            return degraded();
        }
    };
    if !value.is_object() {
        warn!("Model reply is not a JSON object, using degraded proposal");
        return degraded();
    }

    let mut document: ProposalDocument = match serde_json::from_value(value) {
        Ok(doc) => doc,
        Err(e) => {
            warn!("Model reply does not fit the proposal schema ({}), using degraded proposal", e);
            return degraded();
        }
    };

    if document.sources.is_none() {
        debug!("Reply has no Sources, attributing prose sections to {}", FALLBACK_SOURCE);
        document.sources = Some(synthesize_sources(&document));
    }
    Generation::Structured(document)
}

/// Fallback attribution for every non-empty prose section.
fn synthesize_sources(document: &ProposalDocument) -> RawSources {
    SectionKey::PROSE
        .into_iter()
        .filter(|key| {
            document
                .prose(*key)
                .is_some_and(|text| !text.trim().is_empty())
        })
        .map(|key| (key.as_str().to_string(), vec![FALLBACK_SOURCE.to_string()]))
        .collect()
}
