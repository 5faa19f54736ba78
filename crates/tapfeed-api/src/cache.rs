//! In-memory memoization of parsed API documents.

use std::{
    collections::HashMap,
    sync::{Arc, RwLock},
};

use serde_json::Value;

/// Parsed documents keyed by endpoint.
///
/// Entries are never evicted; a store lives as long as the [`crate::Api`] that owns it, and
/// freshness across runs is governed by the on-disk cache files.
#[derive(Debug, Default)]
pub struct CacheStore {
    entries: RwLock<HashMap<String, Arc<Value>>>,
}

impl CacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, endpoint: &str) -> Option<Arc<Value>> {
        // A poisoned lock only means a writer panicked mid-insert; the map itself is intact.
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        entries.get(endpoint).cloned()
    }

    /// Stores `value` under `endpoint`, replacing any previous entry, and returns the shared copy.
    pub fn put(&self, endpoint: &str, value: Value) -> Arc<Value> {
        let value = Arc::new(value);
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries.insert(endpoint.to_string(), Arc::clone(&value));
        value
    }

    pub fn contains(&self, endpoint: &str) -> bool {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        entries.contains_key(endpoint)
    }

    pub fn len(&self) -> usize {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
