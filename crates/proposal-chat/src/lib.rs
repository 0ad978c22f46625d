//! Language model access for proposal generation.
//!
//! Completions go to external APIs (OpenAI, Groq, Anthropic), streamed and
//! collected into a single response text. The [`LanguageModel`] trait is the
//! seam the generation runtime depends on, so tests can substitute a stub.

pub mod config;
pub mod providers;
pub mod types;

pub use config::LLMConfig;
pub use providers::{LanguageModel, RemoteModel};
pub use types::*;
