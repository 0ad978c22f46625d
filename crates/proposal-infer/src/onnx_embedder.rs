//! Sentence-transformer embeddings through ONNX Runtime.
//!
//! The model directory holds `model.onnx` and the matching HuggingFace
//! `tokenizer.json`. Outputs are pooled when needed and scaled to unit
//! length. Requires the `onnx` feature.

#[cfg(feature = "onnx")]
mod inner {
    use std::path::{Path, PathBuf};

    use ndarray::Array1;
    use ort::session::Session;
    use ort::value::Tensor;
    use parking_lot::Mutex;
    use proposal_core::{Error, Result};
    use tokenizers::Tokenizer;
    use tracing::{info, warn};

    use crate::embedder::{l2_normalize, EmbedderBackend, EmbeddingResult};

    /// Longest token sequence fed to the model; longer chunks are truncated.
    const MAX_TOKENS: usize = 512;

    fn load_err(what: &str, detail: impl std::fmt::Display) -> Error {
        Error::Inference(format!("{}: {}", what, detail))
    }

    fn require(path: PathBuf) -> Result<PathBuf> {
        if path.is_file() {
            Ok(path)
        } else {
            Err(Error::Inference(format!("Missing model file {}", path.display())))
        }
    }

    pub struct OnnxEmbedder {
        session: Mutex<Session>,
        tokenizer: Tokenizer,
        model_id: String,
        dimension: usize,
    }

    impl OnnxEmbedder {
        /// Load `model.onnx` and `tokenizer.json` from `model_dir`.
        pub fn load(model_dir: &Path, model_id: &str, dimension: usize) -> Result<Self> {
            let model_file = require(model_dir.join("model.onnx"))?;
            let tokenizer_file = require(model_dir.join("tokenizer.json"))?;

            // load-dynamic: ORT_DYLIB_PATH must point at libonnxruntime.
            ort::init().commit();

            let session = Session::builder()
                .map_err(|e| load_err("ONNX session builder", e))?
                .with_intra_threads(2)
                .map_err(|e| load_err("ONNX thread setup", e))?
                .commit_from_file(&model_file)
                .map_err(|e| load_err("ONNX model load", e))?;
            let tokenizer = Tokenizer::from_file(&tokenizer_file)
                .map_err(|e| load_err("Tokenizer load", e))?;

            info!(
                "Loaded embedding model {} from {} (dim={})",
                model_id,
                model_dir.display(),
                dimension
            );

            Ok(Self {
                session: Mutex::new(session),
                tokenizer,
                model_id: model_id.to_string(),
                dimension,
            })
        }

        fn run(&self, text: &str) -> Option<Array1<f32>> {
            let encoding = self
                .tokenizer
                .encode(text, true)
                .map_err(|e| warn!("Tokenizer rejected input: {}", e))
                .ok()?;

            let len = encoding.get_ids().len().min(MAX_TOKENS);
            let mask = &encoding.get_attention_mask()[..len];
            let inputs = input_tensors(&encoding.get_ids()[..len], mask)
                .map_err(|e| warn!("Could not build model inputs: {}", e))
                .ok()?;

            let mut session = self.session.lock();
            let outputs = session
                .run(ort::inputs![inputs.0, inputs.1, inputs.2])
                .map_err(|e| warn!("Embedding model run failed: {}", e))
                .ok()?;
            let (out_shape, data) = outputs[0]
                .try_extract_tensor::<f32>()
                .map_err(|e| warn!("Unreadable model output: {}", e))
                .ok()?;

            let dims: Vec<usize> = out_shape.iter().map(|&d| d as usize).collect();
            let vector = match dims.as_slice() {
                [_, _, dim] => pool_tokens(data, mask, *dim)?,
                [_, dim] => Array1::from(data[..*dim].to_vec()),
                other => {
                    warn!("Embedding output has unsupported shape {:?}", other);
                    return None;
                }
            };

            if vector.len() != self.dimension {
                warn!(
                    "{} produced {} values, configured for {}",
                    self.model_id,
                    vector.len(),
                    self.dimension
                );
                return None;
            }
            Some(l2_normalize(vector))
        }
    }

    /// Token ids, attention mask and zeroed type ids, each shaped `[1, len]`.
    fn input_tensors(
        ids: &[u32],
        mask: &[u32],
    ) -> ort::Result<(Tensor<i64>, Tensor<i64>, Tensor<i64>)> {
        let shape = [1usize, ids.len()];
        let widen = |xs: &[u32]| xs.iter().map(|&x| x as i64).collect::<Vec<_>>();
        Ok((
            Tensor::from_array((shape, widen(ids)))?,
            Tensor::from_array((shape, widen(mask)))?,
            Tensor::from_array((shape, vec![0i64; ids.len()]))?,
        ))
    }

    /// Mask-weighted mean of token vectors stored row-major as `[tokens][dim]`.
    fn pool_tokens(data: &[f32], mask: &[u32], dim: usize) -> Option<Array1<f32>> {
        let weight: f32 = mask.iter().map(|&m| m as f32).sum();
        if weight < 1e-9 || dim == 0 {
            return None;
        }

        let mut sum = Array1::<f32>::zeros(dim);
        for (row, &m) in data.chunks_exact(dim).zip(mask).filter(|(_, &m)| m > 0) {
            sum.iter_mut()
                .zip(row)
                .for_each(|(acc, &x)| *acc += x * m as f32);
        }
        Some(sum / weight)
    }

    impl EmbedderBackend for OnnxEmbedder {
        fn embed(&self, text: &str) -> Option<EmbeddingResult> {
            self.run(text).map(|embedding| EmbeddingResult {
                embedding,
                cached: false,
            })
        }

        fn dimension(&self) -> usize {
            self.dimension
        }

        fn model_id(&self) -> &str {
            &self.model_id
        }
    }
}

#[cfg(feature = "onnx")]
pub use inner::OnnxEmbedder;
