//! Memoized embeddings.
//!
//! Index rebuilds re-embed every chunk of the corpus, and most chunks are
//! unchanged between runs. Entries are keyed by the SHA-256 of the text so
//! whole 500-word chunks are not kept around as map keys.

use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

use ndarray::Array1;
use parking_lot::Mutex;
use sha2::{Digest, Sha256};

use crate::embedder::{EmbedderBackend, EmbeddingResult};

const DEFAULT_CAPACITY: usize = 4096;
const DEFAULT_TTL: Duration = Duration::from_secs(3600);

type TextKey = [u8; 32];

fn text_key(text: &str) -> TextKey {
    Sha256::digest(text.as_bytes()).into()
}

struct Slot {
    vector: Array1<f32>,
    stored: Instant,
}

#[derive(Default)]
struct Slots {
    by_key: HashMap<TextKey, Slot>,
    /// Least recently used at the front.
    recency: VecDeque<TextKey>,
}

impl Slots {
    fn promote(&mut self, key: &TextKey) {
        if let Some(pos) = self.recency.iter().position(|k| k == key) {
            self.recency.remove(pos);
        }
        self.recency.push_back(*key);
    }

    fn drop_key(&mut self, key: &TextKey) {
        self.by_key.remove(key);
        self.recency.retain(|k| k != key);
    }
}

/// Bounded, expiring embedding store shared across threads.
pub struct EmbeddingCache {
    capacity: usize,
    ttl: Duration,
    slots: Mutex<Slots>,
}

impl Default for EmbeddingCache {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY, DEFAULT_TTL)
    }
}

impl EmbeddingCache {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            capacity: capacity.max(1),
            ttl,
            slots: Mutex::new(Slots::default()),
        }
    }

    /// Look up a vector. Expired entries are dropped on access.
    pub fn lookup(&self, text: &str) -> Option<Array1<f32>> {
        let key = text_key(text);
        let mut slots = self.slots.lock();

        let stored = slots.by_key.get(&key)?.stored;
        if stored.elapsed() >= self.ttl {
            slots.drop_key(&key);
            return None;
        }

        slots.promote(&key);
        slots.by_key.get(&key).map(|slot| slot.vector.clone())
    }

    /// Store a vector, evicting the least recently used entries when full.
    pub fn store(&self, text: &str, vector: Array1<f32>) {
        let key = text_key(text);
        let mut slots = self.slots.lock();

        if !slots.by_key.contains_key(&key) {
            while slots.by_key.len() >= self.capacity {
                match slots.recency.pop_front() {
                    Some(oldest) => {
                        slots.by_key.remove(&oldest);
                    }
                    None => break,
                }
            }
        }

        slots.by_key.insert(
            key,
            Slot {
                vector,
                stored: Instant::now(),
            },
        );
        slots.promote(&key);
    }

    pub fn len(&self) -> usize {
        self.slots.lock().by_key.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        *self.slots.lock() = Slots::default();
    }
}

/// Embedding backend that consults an [`EmbeddingCache`] first.
pub struct CachedEmbedder<E> {
    backend: E,
    cache: EmbeddingCache,
}

impl<E: EmbedderBackend> CachedEmbedder<E> {
    pub fn new(backend: E, cache: EmbeddingCache) -> Self {
        Self { backend, cache }
    }

    pub fn cache(&self) -> &EmbeddingCache {
        &self.cache
    }
}

impl<E: EmbedderBackend> EmbedderBackend for CachedEmbedder<E> {
    fn embed(&self, text: &str) -> Option<EmbeddingResult> {
        if let Some(embedding) = self.cache.lookup(text) {
            return Some(EmbeddingResult {
                embedding,
                cached: true,
            });
        }

        let fresh = self.backend.embed(text)?;
        self.cache.store(text, fresh.embedding.clone());
        Some(fresh)
    }

    fn dimension(&self) -> usize {
        self.backend.dimension()
    }

    fn model_id(&self) -> &str {
        self.backend.model_id()
    }
}
