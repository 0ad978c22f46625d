//! Proposal Ingest: file text extraction, word-window chunking, language detection.

pub mod chunking;
pub mod file;
pub mod language;

pub use chunking::{chunk_id, Chunk, WordWindowChunker};
pub use file::{extract_text, load_document, Document, FileType};
pub use language::{detect_language, DefaultReason, LanguageDetection, Locale};
