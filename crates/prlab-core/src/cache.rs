//! Manager-owned metadata cache.
//!
//! Readers and writers may race; the last write wins and a miss only costs
//! one more request.

use std::collections::HashMap;
use std::hash::Hash;

use tokio::sync::RwLock;

/// Concurrent map of cloneable values.
#[derive(Debug)]
pub struct Cache<K, V> {
    entries: RwLock<HashMap<K, V>>,
}

impl<K, V> Default for Cache<K, V> {
    fn default() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }
}

impl<K: Eq + Hash, V: Clone> Cache<K, V> {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, key: &K) -> Option<V> {
        self.entries.read().await.get(key).cloned()
    }

    pub async fn insert(&self, key: K, value: V) {
        self.entries.write().await.insert(key, value);
    }

    pub async fn remove(&self, key: &K) -> Option<V> {
        self.entries.write().await.remove(key)
    }

    /// Replace every entry at once.
    pub async fn replace(&self, entries: impl IntoIterator<Item = (K, V)>) {
        let mut guard = self.entries.write().await;
        guard.clear();
        guard.extend(entries);
    }

    pub async fn clear(&self) {
        self.entries.write().await.clear();
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}
