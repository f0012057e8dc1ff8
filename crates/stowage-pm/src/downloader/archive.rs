//! Zip archive extraction and single-entry reads.

use std::fs::{self, File};
use std::io::{self, BufReader, Read};
use std::path::{Component, Path};

use zip::result::ZipError;
use zip::ZipArchive;

use crate::{PackageError, Result};

/// Archive extractor
pub struct ArchiveExtractor;

impl ArchiveExtractor {
    /// Extract a zip archive into `dest_dir`, creating it if needed.
    ///
    /// Entries that would land outside `dest_dir` abort the extraction.
    /// Whatever was written before a failure is left for the caller's
    /// workspace cleanup.
    pub fn extract(archive_path: &Path, dest_dir: &Path) -> Result<()> {
        let fail = |reason: String| PackageError::ArchiveExtraction {
            archive: archive_path.display().to_string(),
            reason,
        };

        let file = File::open(archive_path).map_err(|e| fail(format!("Failed to open: {}", e)))?;
        let mut archive = ZipArchive::new(BufReader::new(file))
            .map_err(|e| fail(format!("Failed to open zip: {}", e)))?;

        fs::create_dir_all(dest_dir)
            .map_err(|e| fail(format!("Failed to create {}: {}", dest_dir.display(), e)))?;

        for i in 0..archive.len() {
            let mut entry = archive
                .by_index(i)
                .map_err(|e| fail(format!("Failed to read zip entry: {}", e)))?;

            let name = entry.name().to_string();

            // Validate path doesn't contain traversal sequences
            let relative_path = match entry.enclosed_name() {
                Some(path) if !path.components().any(|c| c == Component::ParentDir) => path,
                _ => return Err(fail(format!("Path traversal detected in archive: {}", name))),
            };

            if relative_path.as_os_str().is_empty() {
                continue;
            }

            let outpath = dest_dir.join(&relative_path);

            if entry.is_dir() {
                fs::create_dir_all(&outpath)
                    .map_err(|e| fail(format!("Failed to create {}: {}", name, e)))?;
                continue;
            }

            if let Some(parent) = outpath.parent() {
                fs::create_dir_all(parent)
                    .map_err(|e| fail(format!("Failed to create {}: {}", parent.display(), e)))?;
            }

            let mut outfile = File::create(&outpath)
                .map_err(|e| fail(format!("Failed to create {}: {}", name, e)))?;
            io::copy(&mut entry, &mut outfile)
                .map_err(|e| fail(format!("Failed to extract {}: {}", name, e)))?;

            // Set permissions on Unix
            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                if let Some(mode) = entry.unix_mode() {
                    fs::set_permissions(&outpath, fs::Permissions::from_mode(mode))
                        .map_err(|e| fail(format!("Failed to set permissions on {}: {}", name, e)))?;
                }
            }
        }

        log::debug!(
            "Extracted {} entries from {} to {}",
            archive.len(),
            archive_path.display(),
            dest_dir.display()
        );

        Ok(())
    }
}

/// Reads single entries out of an archive without unpacking it
pub trait ArchiveReader: Send + Sync {
    /// Contents of the entry called `name`, `None` if the archive has no such entry.
    fn read_entry(&self, archive: &Path, name: &str) -> io::Result<Option<Vec<u8>>>;
}

/// [`ArchiveReader`] for zip files
#[derive(Debug, Default, Clone, Copy)]
pub struct ZipReader;

impl ArchiveReader for ZipReader {
    fn read_entry(&self, archive: &Path, name: &str) -> io::Result<Option<Vec<u8>>> {
        let file = File::open(archive)?;
        let mut zip = ZipArchive::new(BufReader::new(file)).map_err(zip_to_io)?;

        let mut entry = match zip.by_name(name) {
            Ok(entry) => entry,
            Err(ZipError::FileNotFound) => return Ok(None),
            Err(e) => return Err(zip_to_io(e)),
        };

        let mut buffer = Vec::with_capacity(initial_capacity(entry.size()));
        entry.read_to_end(&mut buffer)?;
        Ok(Some(buffer))
    }
}

/// Upper bound on the buffer reserved up front for an entry
const MAX_PREALLOCATION: u64 = 64 * 1024;

/// Buffer size to reserve for an entry whose header declares `declared` bytes.
/// The header comes from the uploader and is not trusted.
fn initial_capacity(declared: u64) -> usize {
    declared.min(MAX_PREALLOCATION) as usize
}

fn zip_to_io(err: ZipError) -> io::Error {
    match err {
        ZipError::Io(e) => e,
        other => io::Error::new(io::ErrorKind::InvalidData, other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Write};
    use tempfile::TempDir;
    use zip::write::SimpleFileOptions;

    fn write_zip(path: &Path, entries: &[(&str, &str)]) {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        for (name, contents) in entries {
            if name.ends_with('/') {
                writer.add_directory(*name, SimpleFileOptions::default()).unwrap();
            } else {
                writer.start_file(*name, SimpleFileOptions::default()).unwrap();
                writer.write_all(contents.as_bytes()).unwrap();
            }
        }
        let bytes = writer.finish().unwrap().into_inner();
        fs::write(path, bytes).unwrap();
    }

    #[test]
    fn test_extract_full_tree() {
        let temp = TempDir::new().unwrap();
        let archive = temp.path().join("pkg.zip");
        write_zip(
            &archive,
            &[
                ("extension.json", r#"{"name":"blog","type":"extension"}"#),
                ("assets/", ""),
                ("assets/icon.svg", "<svg/>"),
                ("src/Blog.php", "<?php"),
            ],
        );

        let dest = temp.path().join("out");
        ArchiveExtractor::extract(&archive, &dest).unwrap();

        assert!(dest.join("extension.json").is_file());
        assert!(dest.join("assets").is_dir());
        assert_eq!(fs::read_to_string(dest.join("assets/icon.svg")).unwrap(), "<svg/>");
        assert!(dest.join("src/Blog.php").is_file());
    }

    #[test]
    fn test_extract_rejects_traversal() {
        let temp = TempDir::new().unwrap();
        let archive = temp.path().join("evil.zip");
        write_zip(&archive, &[("../escaped.txt", "boom")]);

        let dest = temp.path().join("out");
        let result = ArchiveExtractor::extract(&archive, &dest);

        assert!(matches!(result, Err(PackageError::ArchiveExtraction { .. })));
        assert!(!temp.path().join("escaped.txt").exists());
    }

    #[test]
    fn test_extract_allows_dots_inside_names() {
        let temp = TempDir::new().unwrap();
        let archive = temp.path().join("pkg.zip");
        write_zip(&archive, &[("docs/v1..2.txt", "changes"), ("a..b/c.txt", "c")]);

        let dest = temp.path().join("out");
        ArchiveExtractor::extract(&archive, &dest).unwrap();

        assert_eq!(fs::read_to_string(dest.join("docs/v1..2.txt")).unwrap(), "changes");
        assert!(dest.join("a..b/c.txt").is_file());
    }

    #[test]
    fn test_extract_not_a_zip() {
        let temp = TempDir::new().unwrap();
        let archive = temp.path().join("broken.zip");
        fs::write(&archive, b"definitely not a zip").unwrap();

        let result = ArchiveExtractor::extract(&archive, &temp.path().join("out"));
        assert!(matches!(result, Err(PackageError::ArchiveExtraction { .. })));
    }

    #[test]
    fn test_extract_missing_archive() {
        let temp = TempDir::new().unwrap();
        let result = ArchiveExtractor::extract(&temp.path().join("nope.zip"), &temp.path().join("out"));
        assert!(matches!(result, Err(PackageError::ArchiveExtraction { .. })));
    }

    #[test]
    fn test_zip_reader_reads_entry() {
        let temp = TempDir::new().unwrap();
        let archive = temp.path().join("pkg.zip");
        write_zip(&archive, &[("theme.json", r#"{"name":"mytheme"}"#)]);

        let contents = ZipReader.read_entry(&archive, "theme.json").unwrap();
        assert_eq!(contents.as_deref(), Some(br#"{"name":"mytheme"}"#.as_slice()));

        assert!(ZipReader.read_entry(&archive, "extension.json").unwrap().is_none());
    }

    #[test]
    fn test_initial_capacity_is_capped() {
        assert_eq!(initial_capacity(512), 512);
        assert_eq!(initial_capacity(u64::MAX), MAX_PREALLOCATION as usize);
    }

    #[test]
    fn test_zip_reader_invalid_archive() {
        let temp = TempDir::new().unwrap();
        let archive = temp.path().join("broken.zip");
        fs::write(&archive, b"nope").unwrap();

        assert!(ZipReader.read_entry(&archive, "theme.json").is_err());
    }
}
