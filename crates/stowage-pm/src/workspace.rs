//! Temp-rooted working directories.
//!
//! Every pipeline run works inside `<temp-root>/<fingerprint>`. A
//! [`WorkspaceGuard`] owns that directory (and the staged download archive
//! next to it) and removes both when dropped, on success and failure alike.
//! Paths that are not under the temp root are never removed.
//!
//! Runs on the same fingerprint are serialized twice over: through
//! [`WorkspaceLocks`] between threads of one process, and through an
//! advisory lock on `<temp-root>/<fingerprint>.lock` between processes.
//! Both are taken before anything is written and released only after
//! cleanup.

use std::collections::HashSet;
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, Condvar, Mutex};

use fs2::FileExt;

use crate::fingerprint::Fingerprint;
use crate::util::normalize_path;
use crate::{PackageError, Result};

/// Per-fingerprint advisory locks shared by all runs of one process
#[derive(Debug, Default)]
pub struct WorkspaceLocks {
    held: Mutex<HashSet<String>>,
    released: Condvar,
}

impl WorkspaceLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Block until `key` is free, then take it
    fn acquire(&self, key: &str) {
        let mut held = self.held.lock().unwrap_or_else(|e| e.into_inner());
        while held.contains(key) {
            log::debug!("Waiting for workspace {}", key);
            held = self.released.wait(held).unwrap_or_else(|e| e.into_inner());
        }
        held.insert(key.to_string());
    }

    fn release(&self, key: &str) {
        let mut held = self.held.lock().unwrap_or_else(|e| e.into_inner());
        held.remove(key);
        self.released.notify_all();
    }

    /// Whether a run currently holds `key`
    pub fn is_held(&self, key: &str) -> bool {
        self.held
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(key)
    }
}

/// Exclusive `flock`-style lock on a file, removed again on release
#[derive(Debug)]
struct FileLock {
    path: PathBuf,
    file: File,
}

impl FileLock {
    fn acquire(path: PathBuf) -> io::Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        loop {
            let file = OpenOptions::new()
                .read(true)
                .write(true)
                .create(true)
                .truncate(false)
                .open(&path)?;
            file.lock_exclusive()?;

            // The previous holder unlinks the file on release; a lock on the
            // unlinked inode guards nothing.
            if is_same_file(&file, &path) {
                return Ok(Self { path, file });
            }
            log::debug!("Lock file {} was replaced, retrying", path.display());
        }
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        // Unlink while still holding the lock
        if let Err(e) = fs::remove_file(&self.path) {
            log::debug!("Failed to remove {}: {}", self.path.display(), e);
        }
        if let Err(e) = FileExt::unlock(&self.file) {
            log::warn!("Failed to unlock {}: {}", self.path.display(), e);
        }
    }
}

#[cfg(unix)]
fn is_same_file(file: &File, path: &Path) -> bool {
    use std::os::unix::fs::MetadataExt;

    match (file.metadata(), fs::metadata(path)) {
        (Ok(held), Ok(current)) => held.dev() == current.dev() && held.ino() == current.ino(),
        _ => false,
    }
}

#[cfg(not(unix))]
fn is_same_file(_file: &File, path: &Path) -> bool {
    path.exists()
}

/// Hands out workspaces under one temp root
#[derive(Debug, Clone)]
pub struct Workspace {
    temp_root: PathBuf,
    locks: Arc<WorkspaceLocks>,
}

impl Workspace {
    pub fn new(temp_root: impl Into<PathBuf>, locks: Arc<WorkspaceLocks>) -> Self {
        Self {
            temp_root: normalize_path(&temp_root.into()),
            locks,
        }
    }

    /// Path a fingerprint maps to, without acquiring it
    pub fn path_for(&self, fingerprint: &Fingerprint) -> PathBuf {
        self.temp_root.join(fingerprint.as_str())
    }

    /// Take exclusive ownership of the workspace for `fingerprint`.
    ///
    /// Blocks while another run, in this process or another, holds the same
    /// fingerprint.
    pub fn acquire(&self, fingerprint: &Fingerprint) -> Result<WorkspaceGuard> {
        self.locks.acquire(fingerprint.as_str());

        let lock_path = self.temp_root.join(format!("{}.lock", fingerprint));
        let file_lock = match FileLock::acquire(lock_path) {
            Ok(lock) => lock,
            Err(e) => {
                self.locks.release(fingerprint.as_str());
                return Err(PackageError::NotWritable {
                    path: self.temp_root.display().to_string(),
                    reason: e.to_string(),
                });
            }
        };

        let dir = self.path_for(fingerprint);
        let archive = self.temp_root.join(format!("{}.zip", fingerprint));

        log::debug!("Acquired workspace {}", dir.display());

        Ok(WorkspaceGuard {
            temp_root: self.temp_root.clone(),
            dir,
            archive,
            fingerprint: fingerprint.clone(),
            locks: self.locks.clone(),
            file_lock: Some(file_lock),
            keep: false,
        })
    }
}

/// Exclusive handle on one workspace, cleaned up on drop
#[derive(Debug)]
pub struct WorkspaceGuard {
    temp_root: PathBuf,
    dir: PathBuf,
    archive: PathBuf,
    fingerprint: Fingerprint,
    locks: Arc<WorkspaceLocks>,
    file_lock: Option<FileLock>,
    keep: bool,
}

impl WorkspaceGuard {
    /// Directory the package tree lives in
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Where a downloaded archive is staged before extraction
    pub fn archive_path(&self) -> &Path {
        &self.archive
    }

    /// Keep the directory for a later run and release the locks.
    ///
    /// The staged archive is still removed.
    pub fn persist(mut self) -> Fingerprint {
        self.keep = true;
        self.fingerprint.clone()
    }

    fn remove(&self, path: &Path) {
        if !is_under_root(path, &self.temp_root) {
            log::warn!(
                "Not removing {}: outside of temp root {}",
                path.display(),
                self.temp_root.display()
            );
            return;
        }

        let result = if path.is_dir() {
            fs::remove_dir_all(path)
        } else if path.exists() {
            fs::remove_file(path)
        } else {
            return;
        };

        match result {
            Ok(()) => log::debug!("Removed {}", path.display()),
            Err(e) => log::warn!("Failed to remove {}: {}", path.display(), e),
        }
    }
}

impl Drop for WorkspaceGuard {
    fn drop(&mut self) {
        self.remove(&self.archive);
        if !self.keep {
            self.remove(&self.dir);
        }
        drop(self.file_lock.take());
        self.locks.release(self.fingerprint.as_str());
    }
}

/// Textual check that `path` is strictly below `root`
fn is_under_root(path: &Path, root: &Path) -> bool {
    if root.as_os_str().is_empty() {
        return false;
    }

    match path.strip_prefix(root) {
        Ok(rest) => {
            rest.components().next().is_some()
                && rest.components().all(|c| matches!(c, Component::Normal(_)))
        }
        Err(_) => false,
    }
}
