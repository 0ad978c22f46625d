//! Proposal Index: corpus chunk table, exact L2 search, persisted snapshots, retrieval.

pub mod indexer;
pub mod retriever;
pub mod snapshot;
pub mod table;

pub use indexer::CorpusIndexer;
pub use retriever::{Retrieval, RetrievedChunk, Retriever};
pub use table::{ChunkRecord, CorpusIndex, Neighbor};
