//! Transform cache
//!
//! Finished buffers keyed by the exact (pitch, tempo) they were computed for.
//! Entries live until [`TransformCache::clear`]; there is no eviction. The
//! identity key is seeded with the original buffer on load so returning to
//! (0, 1.0) never spawns work.

use std::collections::HashMap;
use std::sync::Arc;

use lf_core::{SampleBuffer, TransformKey};

#[derive(Debug, Default)]
pub struct TransformCache {
    entries: HashMap<TransformKey, Arc<SampleBuffer>>,
}

impl TransformCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has(&self, key: &TransformKey) -> bool {
        self.entries.contains_key(key)
    }

    pub fn get(&self, key: &TransformKey) -> Option<Arc<SampleBuffer>> {
        self.entries.get(key).cloned()
    }

    /// Store a buffer, returning the one it replaced
    pub fn put(&mut self, key: TransformKey, buffer: Arc<SampleBuffer>) -> Option<Arc<SampleBuffer>> {
        log::debug!(
            "[Cache] Stored {} ({:.2}s, {} entries)",
            key,
            buffer.duration(),
            self.entries.len() + usize::from(!self.entries.contains_key(&key))
        );
        self.entries.insert(key, buffer)
    }

    /// Store the untransformed original under the identity key
    pub fn seed_identity(&mut self, original: Arc<SampleBuffer>) {
        self.entries.insert(TransformKey::IDENTITY, original);
    }

    pub fn clear(&mut self) {
        if !self.entries.is_empty() {
            log::debug!("[Cache] Cleared {} entries", self.entries.len());
        }
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> Vec<TransformKey> {
        self.entries.keys().copied().collect()
    }

    /// Sample memory held by all entries
    pub fn total_bytes(&self) -> usize {
        self.entries.values().map(|b| b.size_bytes()).sum()
    }
}
