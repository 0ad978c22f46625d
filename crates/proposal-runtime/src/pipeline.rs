//! End-to-end proposal pipeline.
//!
//! uploads → language → corpus index → retrieval → model → provenance → document.
//! CPU-bound steps (extraction, indexing, embedding, writing) run on the
//! blocking pool; the model call is the only network await.

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;

use proposal_chat::LanguageModel;
use proposal_core::{Error, ProposalConfig, Result};
use proposal_index::{CorpusIndexer, Retrieval, Retriever};
use proposal_infer::EmbedderBackend;
use proposal_ingest::{detect_language, extract_text, LanguageDetection, Locale};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::orchestrator::GenerationOrchestrator;
use crate::provenance::{ProvenanceAssembler, SourcesMap};
use crate::render::{DocumentBuilder, MarkdownBuilder};
use crate::types::FinanceItem;

/// What a caller gets back for one generated proposal.
#[derive(Debug, Clone, Serialize)]
pub struct GenerationOutcome {
    /// File name of the written document.
    pub artifact_id: String,
    pub artifact_path: PathBuf,
    pub language: Locale,
    pub finance_items: Vec<FinanceItem>,
    pub sources: SourcesMap,
    /// True when the model reply could not be parsed.
    pub degraded: bool,
    /// Corpus documents the retriever surfaced for this request.
    pub retrieved_sources: BTreeSet<String>,
}

pub struct ProposalPipeline {
    config: ProposalConfig,
    indexer: CorpusIndexer,
    retriever: Arc<Retriever>,
    orchestrator: GenerationOrchestrator,
    builder: Arc<dyn DocumentBuilder>,
}

async fn blocking<T, F>(what: &'static str, f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| Error::Internal(format!("{} task failed: {}", what, e)))?
}

impl ProposalPipeline {
    pub fn new(
        config: ProposalConfig,
        embedder: Arc<dyn EmbedderBackend>,
        model: Arc<dyn LanguageModel>,
    ) -> Self {
        let indexer = CorpusIndexer::new(&config, embedder.clone());
        let retriever = Arc::new(Retriever::new(embedder, config.top_k));
        let orchestrator = GenerationOrchestrator::new(model, config.temperature, config.max_tokens);
        Self {
            config,
            indexer,
            retriever,
            orchestrator,
            builder: Arc::new(MarkdownBuilder),
        }
    }

    /// Replace the default Markdown builder.
    pub fn with_builder(mut self, builder: Arc<dyn DocumentBuilder>) -> Self {
        self.builder = builder;
        self
    }

    pub fn config(&self) -> &ProposalConfig {
        &self.config
    }

    /// Generate one proposal from uploaded files and a brief.
    pub async fn generate(&self, files: &[PathBuf], brief: &str) -> Result<GenerationOutcome> {
        let paths = files.to_vec();
        let uploads = blocking("extract", move || Ok(read_uploads(&paths))).await?;

        let detection = detect_language(if uploads.trim().is_empty() {
            brief
        } else {
            uploads.as_str()
        });
        if let LanguageDetection::Defaulted { reason } = &detection {
            debug!("Language defaulted to en: {:?}", reason);
        }
        let locale = detection.locale();

        let user_text = format!("{}\n{}", uploads, brief);
        let retrieval = {
            let indexer = self.indexer.clone();
            let retriever = self.retriever.clone();
            let query = user_text.clone();
            blocking("retrieve", move || -> Result<Retrieval> {
                let index = indexer.build()?;
                retriever.retrieve(index.as_ref(), &query)
            })
            .await?
        };

        let context = if retrieval.is_empty() {
            user_text
        } else {
            format!("{}\n\n{}", retrieval.text, user_text)
        };

        let generation = self
            .orchestrator
            .generate(&context, brief, locale, &retrieval.sources)
            .await
            .map_err(|e| {
                if e.is_model_failure() {
                    error!("Language model call failed: {}", e);
                }
                e
            })?;
        let degraded = generation.is_degraded();
        let document = generation.into_document();
        let sources = ProvenanceAssembler::strict(retrieval.sources.clone()).assemble(&document);
        let finance_items = document.financial_proposal.clone();

        let artifact_id = {
            let builder = self.builder.clone();
            let sources = sources.clone();
            let output = self.config.output_folder.clone();
            blocking("render", move || builder.build(&document, &sources, locale, &output)).await?
        };

        info!(
            "Proposal generated: {} ({} sections cited, degraded={})",
            artifact_id,
            sources.len(),
            degraded
        );

        Ok(GenerationOutcome {
            artifact_path: self.config.output_folder.join(&artifact_id),
            artifact_id,
            language: locale,
            finance_items,
            sources,
            degraded,
            retrieved_sources: retrieval.sources,
        })
    }
}

/// Concatenate upload texts, each followed by a newline. Unreadable files
/// contribute nothing.
fn read_uploads(paths: &[PathBuf]) -> String {
    let mut all_text = String::new();
    for path in paths {
        match extract_text(path) {
            Ok(text) => all_text.push_str(&text),
            Err(e) => warn!("Skipping unreadable upload {}: {}", path.display(), e),
        }
        all_text.push('\n');
    }
    all_text
}
