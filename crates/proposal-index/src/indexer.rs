//! Corpus indexer: training folder → documents → chunks → embeddings → index.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use proposal_core::{Error, ProposalConfig, RebuildPolicy, Result};
use proposal_infer::EmbedderBackend;
use proposal_ingest::{load_document, Chunk, Document, WordWindowChunker};
use tracing::{debug, info, warn};

use crate::snapshot;
use crate::table::{ChunkRecord, CorpusIndex};

/// Builds the corpus index. Cheap to clone; clones share the build lock.
#[derive(Clone)]
pub struct CorpusIndexer {
    training_folder: PathBuf,
    index_dir: PathBuf,
    policy: RebuildPolicy,
    chunker: WordWindowChunker,
    embedder: Arc<dyn EmbedderBackend>,
    /// Serializes builds so concurrent requests never race on the snapshot.
    build_lock: Arc<Mutex<()>>,
}

impl CorpusIndexer {
    pub fn new(config: &ProposalConfig, embedder: Arc<dyn EmbedderBackend>) -> Self {
        Self {
            training_folder: config.training_folder.clone(),
            index_dir: config.index_dir.clone(),
            policy: config.rebuild_policy,
            chunker: WordWindowChunker::new(config.chunk_window_size),
            embedder,
            build_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn training_folder(&self) -> &Path {
        &self.training_folder
    }

    /// Produce an index reflecting the corpus as it is now.
    ///
    /// Returns `Ok(None)` when the corpus holds no usable text; retrieval
    /// then yields nothing.
    pub fn build(&self) -> Result<Option<CorpusIndex>> {
        let _guard = self.build_lock.lock();

        let files = self.corpus_files()?;
        let fingerprint =
            snapshot::fingerprint(&files, self.embedder.model_id(), self.chunker.window());

        match self.policy {
            RebuildPolicy::Always => snapshot::remove(&self.index_dir)?,
            RebuildPolicy::OnChange => {
                if let Some(index) = self.reuse_snapshot(&fingerprint)? {
                    info!("Corpus unchanged, reusing index with {} chunks", index.len());
                    return Ok(Some(index));
                }
            }
        }

        let documents = self.load_documents(&files);
        let chunks = self.chunk_documents(&documents);

        if chunks.is_empty() {
            info!("No training data found. Corpus index not built.");
            snapshot::remove(&self.index_dir)?;
            return Ok(None);
        }

        let records = self.embed_chunks(chunks)?;
        let index = CorpusIndex::from_records(
            self.embedder.model_id(),
            self.embedder.dimension(),
            records,
        )?;
        snapshot::save(&self.index_dir, &index, &fingerprint)?;

        info!(
            "Corpus index built with {} chunks from {} documents",
            index.len(),
            documents.len()
        );
        Ok(Some(index))
    }

    /// Files in the training folder, sorted by name. Creates the folder if absent.
    fn corpus_files(&self) -> Result<Vec<PathBuf>> {
        if !self.training_folder.exists() {
            std::fs::create_dir_all(&self.training_folder)?;
            info!("Created training folder {}", self.training_folder.display());
            return Ok(Vec::new());
        }

        let mut files = Vec::new();
        for entry in std::fs::read_dir(&self.training_folder)? {
            let path = entry?.path();
            if path.is_file() {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }

    fn reuse_snapshot(&self, fingerprint: &str) -> Result<Option<CorpusIndex>> {
        let Some(snapshot) = snapshot::load(&self.index_dir)? else {
            return Ok(None);
        };

        if snapshot.fingerprint != fingerprint
            || snapshot.model_id != self.embedder.model_id()
            || snapshot.dimension != self.embedder.dimension()
        {
            debug!("Index snapshot is stale, rebuilding");
            return Ok(None);
        }

        match snapshot.into_index() {
            Ok(index) => Ok(Some(index)),
            Err(e) => {
                warn!("Discarding invalid index snapshot: {}", e);
                Ok(None)
            }
        }
    }

    /// Extract every file, skipping empty and unreadable ones.
    fn load_documents(&self, files: &[PathBuf]) -> Vec<Document> {
        let mut documents = Vec::with_capacity(files.len());
        for path in files {
            match load_document(path) {
                Ok(Some(doc)) => documents.push(doc),
                Ok(None) => debug!("Skipping empty document {}", path.display()),
                Err(e) => warn!("Skipping unreadable document {}: {}", path.display(), e),
            }
        }
        documents
    }

    fn chunk_documents(&self, documents: &[Document]) -> Vec<Chunk> {
        documents
            .iter()
            .flat_map(|doc| self.chunker.chunk(&doc.id, &doc.text))
            .collect()
    }

    fn embed_chunks(&self, chunks: Vec<Chunk>) -> Result<Vec<ChunkRecord>> {
        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        let embeddings = self.embedder.embed_batch(&texts);

        chunks
            .into_iter()
            .zip(embeddings)
            .map(|(chunk, embedding)| {
                let embedding = embedding.ok_or_else(|| {
                    Error::Inference(format!("Failed to embed chunk {}", chunk.id))
                })?;
                Ok(ChunkRecord {
                    id: chunk.id,
                    text: chunk.text,
                    source: chunk.source,
                    vector: embedding.embedding.to_vec(),
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use proposal_core::DataPaths;
    use proposal_infer::{EmbeddingResult, HashingEmbedder};

    /// Hashing embedder that counts how many texts it embedded.
    struct CountingEmbedder {
        inner: HashingEmbedder,
        calls: AtomicUsize,
    }

    impl EmbedderBackend for CountingEmbedder {
        fn embed(&self, text: &str) -> Option<EmbeddingResult> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.embed(text)
        }

        fn dimension(&self) -> usize {
            self.inner.dimension()
        }

        fn model_id(&self) -> &str {
            self.inner.model_id()
        }
    }

    fn setup(policy: RebuildPolicy) -> (tempfile::TempDir, ProposalConfig, Arc<CountingEmbedder>) {
        let dir = tempfile::tempdir().unwrap();
        let paths = DataPaths::new(dir.path()).unwrap();
        let mut config = ProposalConfig::with_paths(&paths);
        config.rebuild_policy = policy;
        config.chunk_window_size = 4;
        let embedder = Arc::new(CountingEmbedder {
            inner: HashingEmbedder::new(32),
            calls: AtomicUsize::new(0),
        });
        (dir, config, embedder)
    }

    fn write(config: &ProposalConfig, name: &str, text: &str) {
        std::fs::create_dir_all(&config.training_folder).unwrap();
        std::fs::write(config.training_folder.join(name), text).unwrap();
    }

    #[test]
    fn test_missing_folder_is_created_and_yields_no_index() {
        let (_dir, config, embedder) = setup(RebuildPolicy::OnChange);
        let indexer = CorpusIndexer::new(&config, embedder);

        assert!(indexer.build().unwrap().is_none());
        assert!(config.training_folder.is_dir());
        assert!(!snapshot::snapshot_path(&config.index_dir).exists());
    }

    #[test]
    fn test_unusable_documents_yield_no_index() {
        let (_dir, config, embedder) = setup(RebuildPolicy::OnChange);
        write(&config, "blank.txt", "   \n");
        write(&config, "image.png", "not text");
        write(&config, "broken.docx", "not a zip");

        let indexer = CorpusIndexer::new(&config, embedder.clone());
        assert!(indexer.build().unwrap().is_none());
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_build_aligns_ids_text_and_sources() {
        let (_dir, config, embedder) = setup(RebuildPolicy::Always);
        write(&config, "b.txt", "one two three four five six");
        write(&config, "a.txt", "alpha beta");
        write(&config, "broken.docx", "not a zip");

        let index = CorpusIndexer::new(&config, embedder).build().unwrap().unwrap();
        let ids: Vec<&str> = index.records().iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["a.txt_chunk0", "b.txt_chunk0", "b.txt_chunk1"]);

        let last = index.record(2).unwrap();
        assert_eq!(last.text, "five six");
        assert_eq!(last.source, "b.txt");
        assert_eq!(index.dimension(), 32);
        assert!(snapshot::snapshot_path(&config.index_dir).exists());
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_unreadable_corpus_file_is_skipped() {
        let (_dir, config, embedder) = setup(RebuildPolicy::OnChange);
        write(&config, "good.txt", "fiber rollout plan");
        // Regular file whose reads fail with EIO.
        std::os::unix::fs::symlink("/proc/self/mem", config.training_folder.join("bad.txt"))
            .unwrap();

        let index = CorpusIndexer::new(&config, embedder).build().unwrap().unwrap();
        assert_eq!(index.len(), 1);
        assert_eq!(index.records()[0].source, "good.txt");
    }

    #[test]
    fn test_unchanged_corpus_reuses_snapshot() {
        let (_dir, config, embedder) = setup(RebuildPolicy::OnChange);
        write(&config, "a.txt", "alpha beta gamma delta epsilon");
        let indexer = CorpusIndexer::new(&config, embedder.clone());

        let first = indexer.build().unwrap().unwrap();
        let calls = embedder.calls.load(Ordering::SeqCst);
        assert_eq!(calls, 2);

        let second = indexer.build().unwrap().unwrap();
        assert_eq!(embedder.calls.load(Ordering::SeqCst), calls);
        let ids = |index: &CorpusIndex| -> Vec<String> {
            index.records().iter().map(|r| r.id.clone()).collect()
        };
        assert_eq!(ids(&first), ids(&second));

        write(&config, "a.txt", "alpha beta gamma delta epsilon zeta eta theta iota");
        let third = indexer.build().unwrap().unwrap();
        assert!(embedder.calls.load(Ordering::SeqCst) > calls);
        assert_eq!(third.len(), 3);
    }

    #[test]
    fn test_always_policy_rebuilds() {
        let (_dir, config, embedder) = setup(RebuildPolicy::Always);
        write(&config, "a.txt", "alpha beta");
        let indexer = CorpusIndexer::new(&config, embedder.clone());

        indexer.build().unwrap();
        indexer.build().unwrap();
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_snapshot_from_other_model_is_not_reused() {
        let (_dir, config, embedder) = setup(RebuildPolicy::OnChange);
        write(&config, "a.txt", "alpha beta");
        CorpusIndexer::new(&config, embedder).build().unwrap();

        let other: Arc<dyn EmbedderBackend> = Arc::new(HashingEmbedder::new(16));
        let index = CorpusIndexer::new(&config, other).build().unwrap().unwrap();
        assert_eq!(index.model_id(), "feature-hashing-16");
        assert_eq!(index.dimension(), 16);
    }

    #[test]
    fn test_emptied_corpus_drops_snapshot() {
        let (_dir, config, embedder) = setup(RebuildPolicy::OnChange);
        write(&config, "a.txt", "alpha beta");
        let indexer = CorpusIndexer::new(&config, embedder);
        assert!(indexer.build().unwrap().is_some());

        std::fs::remove_file(config.training_folder.join("a.txt")).unwrap();
        assert!(indexer.build().unwrap().is_none());
        assert!(!snapshot::snapshot_path(&config.index_dir).exists());
    }
}
