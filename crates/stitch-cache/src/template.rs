//! Memoization of compiled templates.
//!
//! Entries are keyed by template identity and validated against the source
//! modification time, so editing a template forces a recompile while an
//! untouched template is never compiled twice.

use sha2::{Digest, Sha256};

use crate::{Cache, CacheBucket, CacheBucketExt, NullCacheBucket};

/// Bucket name used for compiled templates.
const BUCKET: &str = "templates";

/// Compute the cache key for a template source.
///
/// SHA-256 of `"{identity}|{mtime}"`, hex-encoded. Two different mtimes for
/// the same identity always produce different keys.
#[must_use]
pub fn cache_key(identity: &str, mtime: f64) -> String {
    let mut hasher = Sha256::new();
    hasher.update(format!("{identity}|{mtime}").as_bytes());
    hex::encode(hasher.finalize())
}

/// Cache of compiled template text.
pub struct TemplateCache {
    bucket: Box<dyn CacheBucket>,
    enabled: bool,
}

impl TemplateCache {
    /// Create a template cache backed by `cache`.
    #[must_use]
    pub fn new(cache: &dyn Cache) -> Self {
        Self {
            bucket: cache.bucket(BUCKET),
            enabled: true,
        }
    }

    /// Create a cache that always compiles.
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            bucket: Box::new(NullCacheBucket),
            enabled: false,
        }
    }

    /// Whether lookups can ever hit.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Return the compiled text for a template, compiling on a miss.
    ///
    /// `compile` runs only when no entry exists for `identity` at `mtime`.
    /// Compile errors are returned as-is and nothing is stored.
    pub fn get_or_compile<E, F>(&self, identity: &str, mtime: f64, compile: F) -> Result<String, E>
    where
        F: FnOnce() -> Result<String, E>,
    {
        let slot = slot_for(identity);
        let etag = cache_key(identity, mtime);

        if self.enabled
            && let Some(compiled) = self.bucket.get_string(&slot, &etag)
        {
            tracing::debug!(template = identity, "compiled template cache hit");
            return Ok(compiled);
        }

        tracing::debug!(template = identity, "compiling template");
        let compiled = compile()?;
        if self.enabled {
            self.bucket.set_string(&slot, &etag, &compiled);
        }
        Ok(compiled)
    }

    /// Drop every cached entry.
    pub fn reset(&self) {
        tracing::debug!("resetting compiled template cache");
        self.bucket.clear();
    }
}

/// One storage slot per identity, so a newer mtime replaces the stale entry.
fn slot_for(identity: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(identity.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::convert::Infallible;

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::MemoryCache;

    fn compile_counting(calls: &Cell<u32>, text: &str) -> Result<String, Infallible> {
        calls.set(calls.get() + 1);
        Ok(text.to_owned())
    }

    #[test]
    fn test_cache_key_depends_on_mtime() {
        let a = cache_key("templates/cotton/box.html", 1.0);
        let b = cache_key("templates/cotton/box.html", 2.0);
        let c = cache_key("templates/cotton/box.html", 1.0);

        assert_ne!(a, b);
        assert_eq!(a, c);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn test_get_or_compile_hits_without_recompiling() {
        let cache = MemoryCache::new();
        let templates = TemplateCache::new(&cache);
        let calls = Cell::new(0);

        let first = templates
            .get_or_compile("box.html", 10.0, || compile_counting(&calls, "compiled"))
            .unwrap();
        let second = templates
            .get_or_compile("box.html", 10.0, || compile_counting(&calls, "other"))
            .unwrap();

        assert_eq!(first, "compiled");
        assert_eq!(second, "compiled");
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_changed_mtime_recompiles() {
        let cache = MemoryCache::new();
        let templates = TemplateCache::new(&cache);
        let calls = Cell::new(0);

        templates
            .get_or_compile("box.html", 10.0, || compile_counting(&calls, "old"))
            .unwrap();
        let fresh = templates
            .get_or_compile("box.html", 11.0, || compile_counting(&calls, "new"))
            .unwrap();

        assert_eq!(fresh, "new");
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn test_errors_are_not_cached() {
        let cache = MemoryCache::new();
        let templates = TemplateCache::new(&cache);

        let err: Result<String, &str> = templates.get_or_compile("bad.html", 1.0, || Err("boom"));
        assert_eq!(err, Err("boom"));

        let ok: Result<String, &str> =
            templates.get_or_compile("bad.html", 1.0, || Ok("fixed".to_owned()));
        assert_eq!(ok, Ok("fixed".to_owned()));
    }

    #[test]
    fn test_reset_forces_recompile() {
        let cache = MemoryCache::new();
        let templates = TemplateCache::new(&cache);
        let calls = Cell::new(0);

        templates
            .get_or_compile("box.html", 1.0, || compile_counting(&calls, "x"))
            .unwrap();
        templates.reset();
        templates
            .get_or_compile("box.html", 1.0, || compile_counting(&calls, "x"))
            .unwrap();

        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn test_disabled_always_compiles() {
        let templates = TemplateCache::disabled();
        let calls = Cell::new(0);

        for _ in 0..3 {
            templates
                .get_or_compile("box.html", 1.0, || compile_counting(&calls, "x"))
                .unwrap();
        }

        assert!(!templates.is_enabled());
        assert_eq!(calls.get(), 3);
    }
}
