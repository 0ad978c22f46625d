//! On-disk index snapshot and corpus fingerprinting.
//!
//! The whole table is persisted as one JSON document, written to a temp file
//! and renamed into place so readers never observe a partial snapshot.

use std::path::{Path, PathBuf};

use proposal_core::Result;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::table::{ChunkRecord, CorpusIndex};

pub const SNAPSHOT_FILE: &str = "index.json";

/// Persisted form of a [`CorpusIndex`].
#[derive(Debug, Deserialize)]
pub struct IndexSnapshot {
    pub model_id: String,
    pub dimension: usize,
    pub fingerprint: String,
    pub records: Vec<ChunkRecord>,
}

#[derive(Serialize)]
struct SnapshotRef<'a> {
    model_id: &'a str,
    dimension: usize,
    fingerprint: &'a str,
    records: &'a [ChunkRecord],
}

impl IndexSnapshot {
    pub fn into_index(self) -> Result<CorpusIndex> {
        CorpusIndex::from_records(self.model_id, self.dimension, self.records)
    }
}

pub fn snapshot_path(index_dir: &Path) -> PathBuf {
    index_dir.join(SNAPSHOT_FILE)
}

/// Persist an index together with the fingerprint of the corpus it was built from.
pub fn save(index_dir: &Path, index: &CorpusIndex, fingerprint: &str) -> Result<()> {
    std::fs::create_dir_all(index_dir)?;
    let snapshot = SnapshotRef {
        model_id: index.model_id(),
        dimension: index.dimension(),
        fingerprint,
        records: index.records(),
    };

    let path = snapshot_path(index_dir);
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, serde_json::to_vec(&snapshot)?)?;
    std::fs::rename(&tmp, &path)?;
    debug!("Saved index snapshot ({} chunks) to {}", index.len(), path.display());
    Ok(())
}

/// Load the persisted snapshot. A missing or unreadable snapshot yields None.
pub fn load(index_dir: &Path) -> Result<Option<IndexSnapshot>> {
    let path = snapshot_path(index_dir);
    let raw = match std::fs::read(&path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    match serde_json::from_slice(&raw) {
        Ok(snapshot) => Ok(Some(snapshot)),
        Err(e) => {
            warn!("Ignoring corrupt index snapshot {}: {}", path.display(), e);
            Ok(None)
        }
    }
}

/// Delete the persisted snapshot, if any.
pub fn remove(index_dir: &Path) -> Result<()> {
    let path = snapshot_path(index_dir);
    match std::fs::remove_file(&path) {
        Ok(()) => {
            debug!("Removed old index snapshot: {}", path.display());
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

/// SHA-256 over everything that determines the index contents:
/// embedding model, window size, and each corpus file's name and bytes.
///
/// A file that cannot be read contributes its name and an unreadable marker,
/// so the build can go on and skip it during extraction.
pub fn fingerprint(files: &[PathBuf], model_id: &str, window: usize) -> String {
    let mut hasher = Sha256::new();
    hasher.update(model_id.as_bytes());
    hasher.update(window.to_le_bytes());

    for path in files {
        let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
        hasher.update((name.len() as u64).to_le_bytes());
        hasher.update(name.as_bytes());
        match std::fs::read(path) {
            Ok(bytes) => {
                hasher.update((bytes.len() as u64).to_le_bytes());
                hasher.update(&bytes);
            }
            Err(e) => {
                warn!("Cannot read {} for fingerprinting: {}", path.display(), e);
                hasher.update(u64::MAX.to_le_bytes());
                hasher.update(b"unreadable");
            }
        }
    }

    hex::encode(hasher.finalize())
}
