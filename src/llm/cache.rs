// src/llm/cache.rs
// Process-wide concurrent caches keyed by a structural SHA-256 hash.
//
// Grounded on the teacher's `LlmCache::generate_key` hashing convention
// (backend/src/cache/mod.rs), reduced from its sqlx-backed persistent
// store to an in-memory map — spec §5 calls these "process-wide
// concurrent mappings keyed by structural hashes", not a persisted cache.

use std::collections::HashMap;

use serde::Serialize;
use sha2::{Digest, Sha256};
use tokio::sync::RwLock;

/// Hash any serializable structural key into the cache's string key space.
pub fn structural_key<T: Serialize>(value: &T) -> String {
    let json = serde_json::to_string(value).unwrap_or_default();
    let mut hasher = Sha256::new();
    hasher.update(json.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// A simple process-wide cache. Used for the tool-selection cache (§4.2.2)
/// and the observation-utility cache (§5).
pub struct StructuralCache<V: Clone> {
    entries: RwLock<HashMap<String, V>>,
}

impl<V: Clone> StructuralCache<V> {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub async fn get(&self, key: &str) -> Option<V> {
        self.entries.read().await.get(key).cloned()
    }

    pub async fn put(&self, key: String, value: V) {
        self.entries.write().await.insert(key, value);
    }

    /// Invalidate the whole cache, e.g. on LLM-provider change (§4.2.2).
    pub async fn clear(&self) {
        self.entries.write().await.clear();
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }
}

impl<V: Clone> Default for StructuralCache<V> {
    fn default() -> Self {
        Self::new()
    }
}
