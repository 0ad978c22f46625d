//! Proposal runtime: turns uploads and a brief into a grounded proposal.
//!
//! The pipeline extracts the uploads, detects the output language, refreshes
//! the corpus index, retrieves grounding chunks, asks the language model for a
//! structured proposal, assembles the Sources map and writes the document.

pub mod orchestrator;
pub mod pipeline;
pub mod prompt;
pub mod provenance;
pub mod render;
pub mod types;

pub use orchestrator::{interpret_response, strip_code_fence, Generation, GenerationOrchestrator};
pub use pipeline::{GenerationOutcome, ProposalPipeline};
pub use provenance::{ProvenanceAssembler, SourcesMap};
pub use render::{grand_total, DocumentBuilder, MarkdownBuilder};
pub use types::*;
