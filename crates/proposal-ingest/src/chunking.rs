//! Word-window chunking.
//!
//! Documents are split on whitespace into non-overlapping windows of a fixed
//! number of words. The trailing window may be shorter; it is kept as-is.

use serde::{Deserialize, Serialize};

/// Default window size in words.
pub const DEFAULT_WINDOW_WORDS: usize = 500;

/// A contiguous word-window slice of a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// `{document_id}_chunk{sequence}`.
    pub id: String,
    pub text: String,
    /// Owning document id.
    pub source: String,
    /// 0-based, contiguous per document.
    pub sequence: usize,
}

/// Deterministic chunk identifier.
pub fn chunk_id(document_id: &str, sequence: usize) -> String {
    format!("{}_chunk{}", document_id, sequence)
}

/// Splits text into fixed-size word windows.
#[derive(Debug, Clone, Copy)]
pub struct WordWindowChunker {
    window: usize,
}

impl WordWindowChunker {
    pub fn new(window: usize) -> Self {
        Self {
            window: window.max(1),
        }
    }

    pub fn window(&self) -> usize {
        self.window
    }

    /// Chunk a document. Empty or whitespace-only text yields no chunks.
    pub fn chunk(&self, document_id: &str, text: &str) -> Vec<Chunk> {
        let words: Vec<&str> = text.split_whitespace().collect();
        words
            .chunks(self.window)
            .enumerate()
            .map(|(sequence, window)| Chunk {
                id: chunk_id(document_id, sequence),
                text: window.join(" "),
                source: document_id.to_string(),
                sequence,
            })
            .collect()
    }
}

impl Default for WordWindowChunker {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW_WORDS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn words(n: usize) -> String {
        (0..n).map(|i| format!("w{}", i)).collect::<Vec<_>>().join(" ")
    }

    #[test]
    fn test_concatenation_reproduces_words() {
        let chunker = WordWindowChunker::default();
        for n in [0, 1, 499, 500, 501, 1000, 1200, 1500] {
            let text = words(n);
            let chunks = chunker.chunk("doc.txt", &text);

            let rejoined: Vec<String> = chunks
                .iter()
                .flat_map(|c| c.text.split_whitespace().map(String::from))
                .collect();
            let original: Vec<String> = text.split_whitespace().map(String::from).collect();
            assert_eq!(rejoined, original, "word count {}", n);
            assert_eq!(chunks.len(), n.div_ceil(500), "word count {}", n);
        }
    }

    #[test]
    fn test_partial_last_window_kept() {
        let chunks = WordWindowChunker::default().chunk("a.txt", &words(1200));
        let sizes: Vec<usize> = chunks
            .iter()
            .map(|c| c.text.split_whitespace().count())
            .collect();
        assert_eq!(sizes, vec![500, 500, 200]);
    }

    #[test]
    fn test_ids_deterministic_and_unique() {
        let chunker = WordWindowChunker::new(3);
        let first = chunker.chunk("past.pdf", &words(10));
        let second = chunker.chunk("past.pdf", &words(10));
        assert_eq!(first, second);

        let ids: Vec<&str> = first.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(
            ids,
            vec!["past.pdf_chunk0", "past.pdf_chunk1", "past.pdf_chunk2", "past.pdf_chunk3"]
        );
        let unique: HashSet<&str> = ids.iter().copied().collect();
        assert_eq!(unique.len(), ids.len());
        assert!(first.iter().enumerate().all(|(i, c)| c.sequence == i && c.source == "past.pdf"));
    }

    #[test]
    fn test_whitespace_is_normalized() {
        let chunks = WordWindowChunker::new(2).chunk("x", "  alpha\n\tbeta   gamma \n");
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].text, "alpha beta");
        assert_eq!(chunks[1].text, "gamma");
    }

    #[test]
    fn test_zero_window_clamped() {
        assert_eq!(WordWindowChunker::new(0).window(), 1);
    }
}
