//! Nearest-neighbour retrieval over the corpus index.

use std::collections::BTreeSet;
use std::sync::Arc;

use proposal_core::{Error, Result};
use proposal_infer::EmbedderBackend;
use serde::Serialize;
use tracing::debug;

use crate::table::CorpusIndex;

/// A single ranked hit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetrievedChunk {
    pub chunk_id: String,
    pub source: String,
    /// Squared Euclidean distance to the query.
    pub distance: f32,
}

/// Retrieval output. Empty when there is no index.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Retrieval {
    /// Chunk texts, nearest first, each followed by a newline.
    pub text: String,
    /// Distinct source document ids among the hits.
    pub sources: BTreeSet<String>,
    pub hits: Vec<RetrievedChunk>,
}

impl Retrieval {
    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }
}

pub struct Retriever {
    embedder: Arc<dyn EmbedderBackend>,
    top_k: usize,
}

impl Retriever {
    pub fn new(embedder: Arc<dyn EmbedderBackend>, top_k: usize) -> Self {
        Self { embedder, top_k }
    }

    /// Fetch the `min(top_k, n)` chunks nearest to `query`.
    pub fn retrieve(&self, index: Option<&CorpusIndex>, query: &str) -> Result<Retrieval> {
        let Some(index) = index.filter(|i| !i.is_empty()) else {
            debug!("No corpus index, retrieval skipped");
            return Ok(Retrieval::default());
        };

        if index.model_id() != self.embedder.model_id()
            || index.dimension() != self.embedder.dimension()
        {
            return Err(Error::Inference(format!(
                "Query embedder {} (dim={}) does not match index built with {} (dim={})",
                self.embedder.model_id(),
                self.embedder.dimension(),
                index.model_id(),
                index.dimension()
            )));
        }

        let query_vec = self
            .embedder
            .embed(query)
            .ok_or_else(|| Error::Inference("Failed to embed query".into()))?
            .embedding;

        let k = self.top_k.min(index.len());
        let mut retrieval = Retrieval::default();
        for neighbor in index.search(&query_vec, k) {
            let Some(record) = index.record(neighbor.position) else {
                continue;
            };
            retrieval.text.push_str(&record.text);
            retrieval.text.push('\n');
            retrieval.sources.insert(record.source.clone());
            retrieval.hits.push(RetrievedChunk {
                chunk_id: record.id.clone(),
                source: record.source.clone(),
                distance: neighbor.distance,
            });
        }

        debug!(
            "Retrieved {} chunks from {} sources",
            retrieval.hits.len(),
            retrieval.sources.len()
        );
        Ok(retrieval)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::ChunkRecord;
    use proposal_infer::HashingEmbedder;

    fn build(embedder: &HashingEmbedder, chunks: &[(&str, &str, &str)]) -> CorpusIndex {
        let records = chunks
            .iter()
            .map(|(id, source, text)| ChunkRecord {
                id: id.to_string(),
                text: text.to_string(),
                source: source.to_string(),
                vector: embedder.embed(text).unwrap().embedding.to_vec(),
            })
            .collect();
        CorpusIndex::from_records(embedder.model_id(), embedder.dimension(), records).unwrap()
    }

    fn corpus(embedder: &HashingEmbedder) -> CorpusIndex {
        build(
            embedder,
            &[
                ("a.txt_chunk0", "a.txt", "solar panel installation and inverter wiring"),
                ("a.txt_chunk1", "a.txt", "solar panel maintenance schedule"),
                ("b.txt_chunk0", "b.txt", "catering menu for the annual gala dinner"),
            ],
        )
    }

    #[test]
    fn test_nearest_first() {
        let embedder = HashingEmbedder::new(256);
        let index = corpus(&embedder);
        let retriever = Retriever::new(Arc::new(HashingEmbedder::new(256)), 1);

        let result = retriever
            .retrieve(Some(&index), "catering menu for the annual gala dinner")
            .unwrap();
        assert_eq!(result.hits.len(), 1);
        assert_eq!(result.hits[0].chunk_id, "b.txt_chunk0");
        assert_eq!(result.text, "catering menu for the annual gala dinner\n");
        assert_eq!(result.sources.iter().collect::<Vec<_>>(), vec!["b.txt"]);
    }

    #[test]
    fn test_k_capped_and_sources_deduplicated() {
        let embedder = HashingEmbedder::new(256);
        let index = corpus(&embedder);
        let retriever = Retriever::new(Arc::new(HashingEmbedder::new(256)), 5);

        let result = retriever.retrieve(Some(&index), "solar panel").unwrap();
        assert_eq!(result.hits.len(), 3);
        assert_eq!(result.sources.len(), 2);
        assert_eq!(result.text.lines().count(), 3);
        assert!(result.hits.windows(2).all(|w| w[0].distance <= w[1].distance));
        assert!(result.hits[0].chunk_id.starts_with("a.txt"));
    }

    #[test]
    fn test_no_index_is_empty() {
        let retriever = Retriever::new(Arc::new(HashingEmbedder::new(8)), 5);
        let result = retriever.retrieve(None, "anything").unwrap();
        assert!(result.is_empty());
        assert!(result.text.is_empty());
        assert!(result.sources.is_empty());
    }

    #[test]
    fn test_mismatched_embedder_rejected() {
        let index = corpus(&HashingEmbedder::new(256));
        let retriever = Retriever::new(Arc::new(HashingEmbedder::new(64)), 5);
        let err = retriever.retrieve(Some(&index), "solar").unwrap_err();
        assert!(matches!(err, Error::Inference(_)));
    }
}
