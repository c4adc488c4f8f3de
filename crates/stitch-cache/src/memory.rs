//! In-process cache implementation.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use crate::{Cache, CacheBucket};

type Entries = HashMap<String, (String, Vec<u8>)>;

/// In-memory [`Cache`].
///
/// Buckets opened under the same name share their entries, so a handle
/// obtained later sees what an earlier handle stored.
#[derive(Default)]
pub struct MemoryCache {
    buckets: RwLock<HashMap<String, Arc<RwLock<Entries>>>>,
}

impl MemoryCache {
    /// Create an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Cache for MemoryCache {
    fn bucket(&self, name: &str) -> Box<dyn CacheBucket> {
        let mut buckets = self
            .buckets
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let entries = buckets.entry(name.to_owned()).or_default();
        Box::new(MemoryCacheBucket {
            entries: Arc::clone(entries),
        })
    }
}

struct MemoryCacheBucket {
    entries: Arc<RwLock<Entries>>,
}

impl CacheBucket for MemoryCacheBucket {
    fn get(&self, key: &str, etag: &str) -> Option<Vec<u8>> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        let (stored_etag, data) = entries.get(key)?;
        if !etag.is_empty() && stored_etag != etag {
            return None;
        }
        Some(data.clone())
    }

    fn set(&self, key: &str, etag: &str, value: &[u8]) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_owned(), (etag.to_owned(), value.to_vec()));
    }

    fn clear(&self) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_bucket_etag_validation() {
        let cache = MemoryCache::new();
        let bucket = cache.bucket("templates");

        bucket.set("key", "etag1", b"data");
        assert_eq!(bucket.get("key", "etag1"), Some(b"data".to_vec()));
        assert_eq!(bucket.get("key", "etag2"), None);
        assert_eq!(bucket.get("key", ""), Some(b"data".to_vec()));
        assert_eq!(bucket.get("missing", "etag1"), None);
    }

    #[test]
    fn test_memory_buckets_share_by_name() {
        let cache = MemoryCache::new();
        cache.bucket("templates").set("key", "e", b"shared");

        assert_eq!(cache.bucket("templates").get("key", "e"), Some(b"shared".to_vec()));
        assert_eq!(cache.bucket("other").get("key", "e"), None);
    }

    #[test]
    fn test_memory_bucket_clear() {
        let cache = MemoryCache::new();
        let bucket = cache.bucket("templates");
        bucket.set("a", "e", b"1");
        bucket.set("b", "e", b"2");

        cache.bucket("templates").clear();

        assert_eq!(bucket.get("a", "e"), None);
        assert_eq!(bucket.get("b", "e"), None);
    }
}
