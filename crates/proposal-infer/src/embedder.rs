//! Sentence embedding interface shared by the corpus indexer and the retriever.
//!
//! Backends in this crate:
//! - `OnnxEmbedder`: sentence-transformer run through ONNX Runtime (`onnx` feature)
//! - `HashingEmbedder`: deterministic feature hashing when no model is installed
//! - `CachedEmbedder`: memoizes any other backend
//!
//! A stored index is only searchable with vectors from the same backend, so
//! every index records the `model_id` that produced it.

use ndarray::Array1;

/// A vector produced for one piece of text.
#[derive(Debug, Clone)]
pub struct EmbeddingResult {
    pub embedding: Array1<f32>,
    /// True when the vector came from an [`EmbeddingCache`](crate::EmbeddingCache).
    pub cached: bool,
}

pub trait EmbedderBackend: Send + Sync {
    /// Embed one text. `None` means this input could not be embedded.
    fn embed(&self, text: &str) -> Option<EmbeddingResult>;

    /// Embed many texts, one result per input in input order.
    fn embed_batch(&self, texts: &[&str]) -> Vec<Option<EmbeddingResult>> {
        texts.iter().map(|text| self.embed(text)).collect()
    }

    /// Length of every vector this backend produces.
    fn dimension(&self) -> usize;

    /// Name of the embedding space, e.g. a model name or hashing scheme.
    fn model_id(&self) -> &str;
}

/// Scale a vector to unit length. Zero vectors are returned unchanged.
pub fn l2_normalize(mut v: Array1<f32>) -> Array1<f32> {
    let norm = v.dot(&v).sqrt();
    if norm > 1e-9 {
        v /= norm;
    }
    v
}
