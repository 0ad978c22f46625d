//! Ordered chunk table with exact squared-Euclidean search.
//!
//! Each record carries its chunk id, text, source document and vector, so a
//! search hit's position resolves to all provenance at once. There are no
//! parallel collections to keep in step.

use std::collections::HashSet;

use ndarray::{Array1, ArrayView1};
use proposal_core::{Error, Result};
use serde::{Deserialize, Serialize};

/// One indexed chunk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkRecord {
    pub id: String,
    pub text: String,
    /// Originating document id (file name).
    pub source: String,
    pub vector: Vec<f32>,
}

/// A search result: table position and squared L2 distance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    pub position: usize,
    pub distance: f32,
}

/// Non-empty, immutable table of embedded chunks.
#[derive(Debug, Clone)]
pub struct CorpusIndex {
    model_id: String,
    dimension: usize,
    records: Vec<ChunkRecord>,
}

impl CorpusIndex {
    /// Build an index from records embedded by `model_id`.
    ///
    /// Fails when the table is empty, a vector has the wrong dimension,
    /// or a chunk id repeats.
    pub fn from_records(
        model_id: impl Into<String>,
        dimension: usize,
        records: Vec<ChunkRecord>,
    ) -> Result<Self> {
        if records.is_empty() {
            return Err(Error::Index("cannot build an index with no chunks".into()));
        }

        let mut seen = HashSet::with_capacity(records.len());
        for record in &records {
            if record.vector.len() != dimension {
                return Err(Error::Index(format!(
                    "chunk {} has dimension {}, expected {}",
                    record.id,
                    record.vector.len(),
                    dimension
                )));
            }
            if !seen.insert(record.id.as_str()) {
                return Err(Error::Index(format!("duplicate chunk id {}", record.id)));
            }
        }

        Ok(Self {
            model_id: model_id.into(),
            dimension,
            records,
        })
    }

    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[ChunkRecord] {
        &self.records
    }

    pub fn record(&self, position: usize) -> Option<&ChunkRecord> {
        self.records.get(position)
    }

    /// Exact k-nearest search, nearest first. Ties keep table order.
    pub fn search(&self, query: &Array1<f32>, k: usize) -> Vec<Neighbor> {
        let mut scored: Vec<Neighbor> = self
            .records
            .iter()
            .enumerate()
            .map(|(position, record)| {
                let diff = &ArrayView1::from(record.vector.as_slice()) - query;
                Neighbor {
                    position,
                    distance: diff.dot(&diff),
                }
            })
            .collect();

        scored.sort_by(|a, b| {
            a.distance
                .total_cmp(&b.distance)
                .then(a.position.cmp(&b.position))
        });
        scored.truncate(k.min(self.records.len()));
        scored
    }
}
