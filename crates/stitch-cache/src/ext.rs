//! Extension trait for [`CacheBucket`] with string convenience methods.

use crate::CacheBucket;

/// UTF-8 convenience methods for [`CacheBucket`].
///
/// Implemented as default methods so that [`CacheBucket`] stays object-safe
/// and implementors only handle raw bytes.
pub trait CacheBucketExt: CacheBucket {
    /// Retrieve a cached UTF-8 string.
    ///
    /// Returns `None` on cache miss, etag mismatch, or invalid UTF-8.
    fn get_string(&self, key: &str, etag: &str) -> Option<String> {
        let bytes = self.get(key, etag)?;
        String::from_utf8(bytes).ok()
    }

    /// Store a string value in the cache.
    fn set_string(&self, key: &str, etag: &str, value: &str) {
        self.set(key, etag, value.as_bytes());
    }
}

impl<B: CacheBucket + ?Sized> CacheBucketExt for B {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Cache, MemoryCache};

    #[test]
    fn test_string_roundtrip_and_invalid_utf8() {
        let cache = MemoryCache::new();
        let bucket = cache.bucket("templates");

        bucket.set_string("a", "e", "héllo");
        assert_eq!(bucket.get_string("a", "e").as_deref(), Some("héllo"));

        bucket.set("b", "e", &[0xFF, 0xFE]);
        assert_eq!(bucket.get_string("b", "e"), None);
    }
}
