//! Deterministic feature-hashing embedder.
//!
//! Used when the ONNX model is not installed. Each lowercased token is hashed
//! with SHA-256 into one of `dim` signed buckets and the vector is L2
//! normalized, so texts sharing vocabulary land close together. The output
//! is stable across processes and platforms, which keeps persisted indexes
//! valid between runs.

use ndarray::Array1;
use sha2::{Digest, Sha256};

use crate::embedder::{l2_normalize, EmbedderBackend, EmbeddingResult};

pub struct HashingEmbedder {
    dim: usize,
    model_id: String,
}

impl HashingEmbedder {
    pub fn new(dim: usize) -> Self {
        let dim = dim.max(1);
        Self {
            dim,
            model_id: format!("feature-hashing-{}", dim),
        }
    }

    fn bucket(&self, token: &str) -> (usize, f32) {
        let digest = Sha256::digest(token.as_bytes());
        let mut head = [0u8; 8];
        head.copy_from_slice(&digest[..8]);
        let h = u64::from_le_bytes(head);
        let sign = if h >> 63 == 0 { 1.0 } else { -1.0 };
        ((h % self.dim as u64) as usize, sign)
    }
}

impl EmbedderBackend for HashingEmbedder {
    fn embed(&self, text: &str) -> Option<EmbeddingResult> {
        let mut v = Array1::<f32>::zeros(self.dim);
        for raw in text.split_whitespace() {
            let token: String = raw
                .chars()
                .filter(|c| c.is_alphanumeric())
                .flat_map(char::to_lowercase)
                .collect();
            if token.is_empty() {
                continue;
            }
            let (idx, sign) = self.bucket(&token);
            v[idx] += sign;
        }

        Some(EmbeddingResult {
            embedding: l2_normalize(v),
            cached: false,
        })
    }

    fn dimension(&self) -> usize {
        self.dim
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}
