//! File-based cache implementation.
//!
//! [`FileCache`] stores entries as files on disk, one subdirectory per bucket.
//! Each entry is a single file with a binary header followed by the data:
//!
//! ```text
//! [etag_len: u32 LE][etag bytes][data bytes]
//! ```
//!
//! Only the header is read to validate the etag; the body is read on a hit.
//! Entries are written to a temporary file and renamed into place.
//!
//! On construction, [`FileCache`] validates a `VERSION` file in the cache root.
//! If it is missing or different, the whole cache directory is wiped.

use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};

use crate::{Cache, CacheBucket};

/// File-based [`Cache`] rooted at a directory on disk.
///
/// Directory layout:
/// ```text
/// {root}/
/// +-- VERSION            # contains the cache version string
/// +-- templates/         # bucket "templates"
///     +-- 3f9a...        # cache entry
/// ```
pub struct FileCache {
    root: PathBuf,
}

impl FileCache {
    /// Create a new file-based cache at `root`, validating the cache version.
    ///
    /// Errors during validation are logged but never fatal.
    #[must_use]
    pub fn new(root: PathBuf, version: &str) -> Self {
        validate_version(&root, version);
        Self { root }
    }
}

impl Cache for FileCache {
    fn bucket(&self, name: &str) -> Box<dyn CacheBucket> {
        Box::new(FileCacheBucket {
            dir: self.root.join(name),
        })
    }
}

/// A single bucket backed by a directory on disk.
struct FileCacheBucket {
    dir: PathBuf,
}

impl CacheBucket for FileCacheBucket {
    fn get(&self, key: &str, etag: &str) -> Option<Vec<u8>> {
        let mut file = File::open(self.dir.join(key)).ok()?;

        let mut len_buf = [0u8; 4];
        file.read_exact(&mut len_buf).ok()?;
        let etag_len = u32::from_le_bytes(len_buf) as usize;

        let mut stored_etag = vec![0u8; etag_len];
        file.read_exact(&mut stored_etag).ok()?;

        if !etag.is_empty() && stored_etag != etag.as_bytes() {
            return None;
        }

        let mut data = Vec::new();
        file.read_to_end(&mut data).ok()?;
        Some(data)
    }

    fn set(&self, key: &str, etag: &str, value: &[u8]) {
        let path = self.dir.join(key);

        // Write failures only cost a recompile.
        let Some(parent) = path.parent() else {
            return;
        };
        if let Err(e) = fs::create_dir_all(parent) {
            tracing::debug!(error = %e, "failed to create cache bucket directory");
            return;
        }

        let etag_bytes = etag.as_bytes();
        let Ok(etag_len) = u32::try_from(etag_bytes.len()) else {
            return;
        };
        let mut buf = Vec::with_capacity(4 + etag_bytes.len() + value.len());
        buf.extend_from_slice(&etag_len.to_le_bytes());
        buf.extend_from_slice(etag_bytes);
        buf.extend_from_slice(value);

        // Readers never see a partial entry; concurrent writers race on the rename.
        let tmp = path.with_extension(format!("tmp{}", std::process::id()));
        let written = fs::write(&tmp, &buf).and_then(|()| fs::rename(&tmp, &path));
        if let Err(e) = written {
            tracing::debug!(error = %e, path = %path.display(), "failed to write cache entry");
            let _ = fs::remove_file(&tmp);
        }
    }

    fn clear(&self) {
        if self.dir.exists()
            && let Err(e) = fs::remove_dir_all(&self.dir)
        {
            tracing::warn!("failed to clear cache bucket: {e}");
        }
    }
}

/// Validate the cache version, wiping the directory on mismatch.
fn validate_version(root: &Path, version: &str) {
    let version_file = root.join("VERSION");

    match fs::read_to_string(&version_file) {
        Ok(stored) if stored == version => {
            tracing::debug!("cache version matches: {version}");
            return;
        }
        Ok(stored) => {
            tracing::info!(
                "cache version mismatch (stored={stored}, current={version}), wiping cache"
            );
        }
        Err(_) => {
            tracing::info!("no cache VERSION file found, initializing cache");
        }
    }

    if root.exists()
        && let Err(e) = fs::remove_dir_all(root)
    {
        tracing::warn!("failed to remove cache directory: {e}");
    }
    if let Err(e) = fs::create_dir_all(root) {
        tracing::warn!("failed to create cache directory: {e}");
        return;
    }
    if let Err(e) = fs::write(&version_file, version) {
        tracing::warn!("failed to write cache VERSION file: {e}");
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn test_file_bucket_etag_match() {
        let tmp = TempDir::new().unwrap();
        let cache = FileCache::new(tmp.path().join("cache"), "v1");
        let bucket = cache.bucket("templates");

        bucket.set("key", "correct-etag", b"{% c box %}{% endc %}");

        assert_eq!(
            bucket.get("key", "correct-etag"),
            Some(b"{% c box %}{% endc %}".to_vec())
        );
        assert_eq!(bucket.get("key", "wrong-etag"), None);
        assert_eq!(bucket.get("key", ""), Some(b"{% c box %}{% endc %}".to_vec()));
    }

    #[test]
    fn test_file_bucket_overwrite() {
        let tmp = TempDir::new().unwrap();
        let cache = FileCache::new(tmp.path().join("cache"), "v1");
        let bucket = cache.bucket("templates");

        bucket.set("key", "etag1", b"first");
        bucket.set("key", "etag2", b"second");

        assert_eq!(bucket.get("key", "etag1"), None);
        assert_eq!(bucket.get("key", "etag2"), Some(b"second".to_vec()));
    }

    #[test]
    fn test_file_bucket_clear() {
        let tmp = TempDir::new().unwrap();
        let cache = FileCache::new(tmp.path().join("cache"), "v1");
        let bucket = cache.bucket("templates");
        let other = cache.bucket("other");

        bucket.set("key", "etag", b"data");
        other.set("key", "etag", b"kept");
        bucket.clear();

        assert_eq!(bucket.get("key", "etag"), None);
        assert_eq!(other.get("key", "etag"), Some(b"kept".to_vec()));

        // Bucket is usable again after clearing
        bucket.set("key", "etag", b"again");
        assert_eq!(bucket.get("key", "etag"), Some(b"again".to_vec()));
    }

    #[test]
    fn test_file_bucket_leaves_no_temp_files() {
        let tmp = TempDir::new().unwrap();
        let cache = FileCache::new(tmp.path().join("cache"), "v1");
        let bucket = cache.bucket("templates");

        bucket.set("3f9a", "etag", b"compiled");
        bucket.set("3f9a", "etag2", b"recompiled");

        let names: Vec<_> = fs::read_dir(tmp.path().join("cache/templates"))
            .unwrap()
            .map(|entry| entry.unwrap().file_name().into_string().unwrap())
            .collect();
        assert_eq!(names, vec!["3f9a".to_owned()]);
    }

    #[test]
    fn test_version_match_keeps_cache() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("cache");

        let cache = FileCache::new(root.clone(), "v1");
        cache.bucket("templates").set("key", "etag1", b"preserved");

        let cache2 = FileCache::new(root, "v1");
        assert_eq!(
            cache2.bucket("templates").get("key", "etag1"),
            Some(b"preserved".to_vec())
        );
    }

    #[test]
    fn test_version_mismatch_wipes_cache() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("cache");

        let cache = FileCache::new(root.clone(), "v1");
        cache.bucket("templates").set("key", "etag1", b"will-be-wiped");

        let cache2 = FileCache::new(root.clone(), "v2");
        assert_eq!(cache2.bucket("templates").get("key", "etag1"), None);

        let version = fs::read_to_string(root.join("VERSION")).unwrap();
        assert_eq!(version, "v2");
    }

    #[test]
    fn test_nonexistent_root_creates_version() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("deeply/nested/cache");
        assert!(!root.exists());

        let _cache = FileCache::new(root.clone(), "v1");

        let version = fs::read_to_string(root.join("VERSION")).unwrap();
        assert_eq!(version, "v1");
    }
}
