//! Compiled template cache for Stitch.
//!
//! Two traits decouple cache consumers from storage:
//!
//! - [`Cache`]: Factory for named cache buckets
//! - [`CacheBucket`]: Key-value store with etag-based invalidation
//!
//! [`TemplateCache`] sits on top of a bucket and memoizes the component
//! compiler, keyed by template identity and modification time.
//!
//! # Implementations
//!
//! - [`NullCache`] / [`NullCacheBucket`]: No-op implementations (always miss)
//! - [`MemoryCache`]: In-process maps shared between bucket handles
//! - [`FileCache`]: File-based implementation with version validation
//!
//! # Example
//!
//! ```
//! use stitch_cache::{Cache, MemoryCache};
//!
//! let cache = MemoryCache::new();
//! let bucket = cache.bucket("templates");
//! bucket.set("page", "v1", b"{% c box %}{% endc %}");
//! assert_eq!(bucket.get("page", "v1").as_deref(), Some(&b"{% c box %}{% endc %}"[..]));
//! assert_eq!(bucket.get("page", "v2"), None);
//! ```

mod ext;
mod file;
mod memory;
mod template;

pub use ext::CacheBucketExt;
pub use file::FileCache;
pub use memory::MemoryCache;
pub use template::{TemplateCache, cache_key};

/// A named partition within a [`Cache`].
///
/// Each bucket stores key-value pairs where values are invalidated by an etag.
/// The etag is an opaque string chosen by the caller. A cache hit occurs only
/// when both the key and etag match.
pub trait CacheBucket: Send + Sync {
    /// Retrieve a cached value.
    ///
    /// Returns `Some(value)` if the key exists **and** was stored with the same
    /// `etag`. If `etag` is empty, etag validation is skipped.
    fn get(&self, key: &str, etag: &str) -> Option<Vec<u8>>;

    /// Store a value in the cache, overwriting any existing entry for `key`.
    fn set(&self, key: &str, etag: &str, value: &[u8]);

    /// Drop every entry in this bucket.
    fn clear(&self);
}

/// Factory for named cache [`CacheBucket`]s.
///
/// Calling `bucket` multiple times with the same name may return independent
/// handles that share the same underlying storage.
pub trait Cache: Send + Sync {
    /// Open or create a named bucket.
    fn bucket(&self, name: &str) -> Box<dyn CacheBucket>;
}

/// No-op [`CacheBucket`] that never stores or retrieves data.
pub struct NullCacheBucket;

impl CacheBucket for NullCacheBucket {
    fn get(&self, _key: &str, _etag: &str) -> Option<Vec<u8>> {
        None
    }

    fn set(&self, _key: &str, _etag: &str, _value: &[u8]) {}

    fn clear(&self) {}
}

/// No-op [`Cache`] that always returns [`NullCacheBucket`]s.
///
/// Use when caching is disabled.
pub struct NullCache;

impl Cache for NullCache {
    fn bucket(&self, _name: &str) -> Box<dyn CacheBucket> {
        Box::new(NullCacheBucket)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_cache_always_misses() {
        let cache = NullCache;
        let bucket = cache.bucket("templates");

        assert_eq!(bucket.get("key", "etag1"), None);

        bucket.set("key", "etag1", b"hello");
        assert_eq!(bucket.get("key", "etag1"), None);
    }
}
