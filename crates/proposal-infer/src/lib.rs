//! Proposal Infer: sentence embeddings for corpus chunks and queries.
//!
//! [`create_embedder`] picks the backend. With the `onnx` feature and a model
//! installed under the models folder, chunks are embedded by the configured
//! sentence-transformer; otherwise [`HashingEmbedder`] keeps retrieval working
//! offline. The chosen backend is always memoized by an [`EmbeddingCache`].

pub mod cache;
pub mod embedder;
pub mod hashing;
pub mod onnx_embedder;

pub use cache::{CachedEmbedder, EmbeddingCache};
pub use embedder::{l2_normalize, EmbedderBackend, EmbeddingResult};
pub use hashing::HashingEmbedder;

#[cfg(feature = "onnx")]
pub use onnx_embedder::OnnxEmbedder;

use std::path::Path;
use std::sync::Arc;

fn cached<E: EmbedderBackend + 'static>(backend: E) -> Arc<dyn EmbedderBackend> {
    Arc::new(CachedEmbedder::new(backend, EmbeddingCache::default()))
}

/// Embedder for `model_id` loaded from `model_dir`, or feature hashing of
/// width `dim` when the model cannot be used.
pub fn create_embedder(model_dir: &Path, model_id: &str, dim: usize) -> Arc<dyn EmbedderBackend> {
    #[cfg(feature = "onnx")]
    {
        match OnnxEmbedder::load(model_dir, model_id, dim) {
            Ok(model) => return cached(model),
            Err(e) => tracing::warn!("{} unavailable ({}); embedding with feature hashing", model_id, e),
        }
    }

    #[cfg(not(feature = "onnx"))]
    {
        tracing::info!(
            "Built without ONNX support; {} in {} ignored, embedding with feature hashing",
            model_id,
            model_dir.display()
        );
    }

    cached(HashingEmbedder::new(dim))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_model_falls_back_to_hashing() {
        let dir = tempfile::tempdir().unwrap();
        let embedder = create_embedder(dir.path(), "all-MiniLM-L6-v2", 32);

        assert_eq!(embedder.model_id(), "feature-hashing-32");
        assert_eq!(embedder.dimension(), 32);
        assert!(embedder.embed("network upgrade").is_some());
    }
}
