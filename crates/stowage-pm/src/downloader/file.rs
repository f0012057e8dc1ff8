//! File downloader for HTTP/HTTPS archives.

use std::fs;
use std::io;
use std::path::Path;
use std::sync::Arc;

use crate::http::{HttpError, Transport};
use crate::{PackageError, Result};

use super::checksum::verify_checksum;

/// Filesystem writes made by the downloader
pub trait FileWriter: Send + Sync {
    /// Write `contents` to `path`, creating parent directories.
    fn write(&self, path: &Path, contents: &[u8]) -> io::Result<()>;

    fn read(&self, path: &Path) -> io::Result<Vec<u8>>;

    fn remove(&self, path: &Path) -> io::Result<()>;
}

/// [`FileWriter`] backed by `std::fs`
#[derive(Debug, Default, Clone, Copy)]
pub struct FsWriter;

impl FileWriter for FsWriter {
    fn write(&self, path: &Path, contents: &[u8]) -> io::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, contents)
    }

    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        fs::read(path)
    }

    fn remove(&self, path: &Path) -> io::Result<()> {
        fs::remove_file(path)
    }
}

/// File downloader for HTTP archives
pub struct FileDownloader {
    transport: Arc<dyn Transport>,
    writer: Arc<dyn FileWriter>,
}

impl FileDownloader {
    /// Create a new file downloader writing to the real filesystem
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            writer: Arc::new(FsWriter),
        }
    }

    /// Replace the filesystem backend
    pub fn with_writer(mut self, writer: Arc<dyn FileWriter>) -> Self {
        self.writer = writer;
        self
    }

    /// Download `url` to `dest` and verify it against `expected_checksum`.
    ///
    /// On a checksum mismatch the written file is removed again, so a
    /// successful return is the only way a file is left at `dest`.
    pub fn fetch(
        &self,
        dest: &Path,
        url: &str,
        expected_checksum: &str,
        credential: Option<&str>,
    ) -> Result<()> {
        let bytes = self
            .transport
            .get(url, credential)
            .map_err(|e| download_error(url, e))?;

        self.writer
            .write(dest, &bytes)
            .map_err(|e| not_writable(dest, e))?;

        let written = self
            .writer
            .read(dest)
            .map_err(|e| not_writable(dest, e))?;

        if !verify_checksum(&written, expected_checksum) {
            // Remove the downloaded file
            if let Err(e) = self.writer.remove(dest) {
                log::warn!("Failed to remove {}: {}", dest.display(), e);
            }
            return Err(PackageError::ChecksumVerification {
                url: url.to_string(),
            });
        }

        log::debug!("Verified {} ({} bytes)", dest.display(), written.len());
        Ok(())
    }
}

fn download_error(url: &str, err: HttpError) -> PackageError {
    if err.is_unauthorized() {
        PackageError::UnauthorizedDownload {
            url: url.to_string(),
        }
    } else {
        PackageError::Download {
            url: url.to_string(),
            reason: err.to_string(),
        }
    }
}

fn not_writable(path: &Path, err: io::Error) -> PackageError {
    PackageError::NotWritable {
        path: path.display().to_string(),
        reason: err.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::path::PathBuf;
    use std::sync::Mutex;

    const BODY: &[u8] = b"hello world";
    const BODY_SHA1: &str = "2aae6c35c94fcfb415dbe95f408b9ce91ee846ed";

    struct FakeTransport {
        status: Option<u16>,
        seen_credential: Mutex<Option<String>>,
    }

    impl FakeTransport {
        fn ok() -> Self {
            Self { status: None, seen_credential: Mutex::new(None) }
        }

        fn failing(status: u16) -> Self {
            Self { status: Some(status), seen_credential: Mutex::new(None) }
        }
    }

    impl Transport for FakeTransport {
        fn get(&self, url: &str, credential: Option<&str>) -> std::result::Result<Vec<u8>, HttpError> {
            *self.seen_credential.lock().unwrap() = credential.map(str::to_string);
            match self.status {
                Some(status) => Err(HttpError::HttpStatus { status, url: url.to_string() }),
                None => Ok(BODY.to_vec()),
            }
        }
    }

    #[derive(Default)]
    struct MemoryWriter {
        files: Mutex<HashMap<PathBuf, Vec<u8>>>,
        read_only: bool,
    }

    impl FileWriter for MemoryWriter {
        fn write(&self, path: &Path, contents: &[u8]) -> io::Result<()> {
            if self.read_only {
                return Err(io::Error::new(io::ErrorKind::PermissionDenied, "read-only"));
            }
            self.files.lock().unwrap().insert(path.to_path_buf(), contents.to_vec());
            Ok(())
        }

        fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
            self.files
                .lock()
                .unwrap()
                .get(path)
                .cloned()
                .ok_or_else(|| io::Error::from(io::ErrorKind::NotFound))
        }

        fn remove(&self, path: &Path) -> io::Result<()> {
            self.files.lock().unwrap().remove(path);
            Ok(())
        }
    }

    fn downloader(transport: Arc<FakeTransport>, writer: Arc<MemoryWriter>) -> FileDownloader {
        FileDownloader::new(transport).with_writer(writer)
    }

    #[test]
    fn test_fetch_writes_verified_file() {
        let transport = Arc::new(FakeTransport::ok());
        let writer = Arc::new(MemoryWriter::default());
        let dest = Path::new("/tmp/stowage/abc.zip");

        downloader(transport.clone(), writer.clone())
            .fetch(dest, "https://example.com/blog.zip", BODY_SHA1, Some("key"))
            .unwrap();

        assert_eq!(writer.files.lock().unwrap().get(dest).unwrap(), BODY);
        assert_eq!(transport.seen_credential.lock().unwrap().as_deref(), Some("key"));
    }

    #[test]
    fn test_fetch_checksum_mismatch_removes_file() {
        let writer = Arc::new(MemoryWriter::default());
        let dest = Path::new("/tmp/stowage/abc.zip");

        let result = downloader(Arc::new(FakeTransport::ok()), writer.clone()).fetch(
            dest,
            "https://example.com/blog.zip",
            "0000000000000000000000000000000000000000",
            None,
        );

        assert!(matches!(result, Err(PackageError::ChecksumVerification { .. })));
        assert!(writer.files.lock().unwrap().is_empty());
    }

    #[test]
    fn test_fetch_unauthorized() {
        for status in [401, 403] {
            let result = downloader(Arc::new(FakeTransport::failing(status)), Arc::default())
                .fetch(Path::new("/tmp/x.zip"), "https://example.com/x.zip", BODY_SHA1, Some("bad"));
            assert!(matches!(result, Err(PackageError::UnauthorizedDownload { .. })));
        }
    }

    #[test]
    fn test_fetch_other_http_failure() {
        let writer = Arc::new(MemoryWriter::default());
        let result = downloader(Arc::new(FakeTransport::failing(404)), writer.clone())
            .fetch(Path::new("/tmp/x.zip"), "https://example.com/x.zip", BODY_SHA1, None);

        assert!(matches!(result, Err(PackageError::Download { .. })));
        assert!(writer.files.lock().unwrap().is_empty());
    }

    #[test]
    fn test_fetch_not_writable() {
        let writer = Arc::new(MemoryWriter { read_only: true, ..Default::default() });
        let result = downloader(Arc::new(FakeTransport::ok()), writer)
            .fetch(Path::new("/tmp/x.zip"), "https://example.com/x.zip", BODY_SHA1, None);

        assert!(matches!(result, Err(PackageError::NotWritable { .. })));
    }

    #[test]
    fn test_fs_writer_creates_parents() {
        let temp = tempfile::TempDir::new().unwrap();
        let dest = temp.path().join("nested/dir/file.zip");

        FsWriter.write(&dest, BODY).unwrap();
        assert_eq!(FsWriter.read(&dest).unwrap(), BODY);

        FsWriter.remove(&dest).unwrap();
        assert!(!dest.exists());
    }
}
