//! System cache invalidation after a successful install.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

/// Invalidates whatever caches depend on the set of installed packages.
///
/// Called once after every successful install. Failures are logged by the
/// caller and never turn a successful install into an error.
pub trait CacheInvalidator: Send + Sync {
    fn clear(&self) -> io::Result<()>;
}

/// Invalidator for setups without a cache
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopCache;

impl CacheInvalidator for NoopCache {
    fn clear(&self) -> io::Result<()> {
        Ok(())
    }
}

/// Filesystem cache directory whose contents are wiped on invalidation
#[derive(Debug, Clone)]
pub struct CacheDir {
    root: PathBuf,
}

impl CacheDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Get the root directory of the cache
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Total size of all files in the cache, in bytes
    pub fn size(&self) -> io::Result<u64> {
        if !self.root.exists() {
            return Ok(0);
        }

        let mut total = 0;
        for entry in WalkDir::new(&self.root) {
            let entry = entry.map_err(io::Error::from)?;
            if entry.file_type().is_file() {
                total += entry.metadata().map_err(io::Error::from)?.len();
            }
        }
        Ok(total)
    }

    /// Remove everything inside the cache, keeping the directory itself.
    /// Returns the number of bytes freed.
    pub fn clear_contents(&self) -> io::Result<u64> {
        if !self.root.exists() {
            return Ok(0);
        }

        let freed = self.size()?;

        for entry in fs::read_dir(&self.root)? {
            let path = entry?.path();
            if path.is_dir() {
                fs::remove_dir_all(&path)?;
            } else {
                fs::remove_file(&path)?;
            }
        }

        log::debug!("Cleared cache {} ({} bytes)", self.root.display(), freed);
        Ok(freed)
    }
}

impl CacheInvalidator for CacheDir {
    fn clear(&self) -> io::Result<()> {
        self.clear_contents().map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_clear_removes_contents_keeps_root() {
        let temp = TempDir::new().unwrap();
        let cache = CacheDir::new(temp.path().join("cache"));
        fs::create_dir_all(cache.root().join("routes")).unwrap();
        fs::write(cache.root().join("routes/app.php"), "12345").unwrap();
        fs::write(cache.root().join("config.cache"), "123").unwrap();

        assert_eq!(cache.size().unwrap(), 8);
        assert_eq!(cache.clear_contents().unwrap(), 8);

        assert!(cache.root().is_dir());
        assert_eq!(fs::read_dir(cache.root()).unwrap().count(), 0);
    }

    #[test]
    fn test_clear_missing_dir_is_ok() {
        let temp = TempDir::new().unwrap();
        let cache = CacheDir::new(temp.path().join("missing"));

        assert_eq!(cache.size().unwrap(), 0);
        assert!(cache.clear().is_ok());
    }

    #[test]
    fn test_noop() {
        assert!(NoopCache.clear().is_ok());
    }
}
