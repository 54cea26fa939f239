//! Bounded LRU of query results keyed by request signature.

use std::num::NonZeroUsize;
use std::sync::Arc;

use lru::LruCache;

use posdb_core::QueryCacheEntry;

pub struct QueryCache {
    entries: LruCache<String, Arc<QueryCacheEntry>>,
}

impl QueryCache {
    /// A capacity of 0 is raised to 1.
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: LruCache::new(NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN)),
        }
    }

    /// Look up and mark as most recently used.
    pub fn get(&mut self, signature: &str) -> Option<Arc<QueryCacheEntry>> {
        self.entries.get(signature).cloned()
    }

    pub fn contains(&self, signature: &str) -> bool {
        self.entries.contains(signature)
    }

    pub fn insert(&mut self, signature: String, entry: Arc<QueryCacheEntry>) {
        self.entries.put(signature, entry);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.entries.cap().get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use posdb_core::QueryResponse;
    use std::collections::HashMap;

    fn entry() -> Arc<QueryCacheEntry> {
        Arc::new(QueryCacheEntry::new(
            QueryResponse { results: vec![] },
            HashMap::new(),
        ))
    }

    #[test]
    fn test_evicts_least_recently_used() {
        let mut cache = QueryCache::new(2);
        cache.insert("a".into(), entry());
        cache.insert("b".into(), entry());
        assert!(cache.get("a").is_some());
        cache.insert("c".into(), entry());

        assert!(cache.contains("a"));
        assert!(!cache.contains("b"));
        assert!(cache.contains("c"));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_zero_capacity_clamped() {
        let mut cache = QueryCache::new(0);
        assert_eq!(cache.capacity(), 1);
        cache.insert("a".into(), entry());
        cache.clear();
        assert!(cache.is_empty());
    }
}
