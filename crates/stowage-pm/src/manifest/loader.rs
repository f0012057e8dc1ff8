use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::package::Package;
use crate::downloader::{compute_sha1, ArchiveReader, ZipReader};
use crate::{PackageError, Result};

pub const THEME_MANIFEST: &str = "theme.json";
pub const EXTENSION_MANIFEST: &str = "extension.json";

/// Lookup order. A theme manifest wins when a package ships both.
const MANIFEST_NAMES: [&str; 2] = [THEME_MANIFEST, EXTENSION_MANIFEST];

/// Why a manifest could not be loaded. Never shown to callers; every
/// variant surfaces as [`PackageError::PackageLoad`].
#[derive(Debug, thiserror::Error)]
enum LoadError {
    #[error("Failed to read: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("No theme.json or extension.json found")]
    Missing,

    #[error("Validation error: {0}")]
    Validation(String),
}

/// A parsed manifest and where it was found.
#[derive(Debug, Clone)]
pub struct Manifest {
    pub package: Package,
    /// `<source>/<manifest name>`. For archives this names the entry, the
    /// file only exists on disk once the archive is extracted to `source`.
    pub path: PathBuf,
}

/// Locates and parses package manifests
pub struct ManifestLoader {
    archives: Arc<dyn ArchiveReader>,
}

impl Default for ManifestLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ManifestLoader {
    pub fn new() -> Self {
        Self {
            archives: Arc::new(ZipReader),
        }
    }

    /// Replace the archive backend
    pub fn with_reader(archives: Arc<dyn ArchiveReader>) -> Self {
        Self { archives }
    }

    /// Load the manifest from a package directory or a package archive.
    pub fn load(&self, source: &Path) -> Result<Manifest> {
        let result = if source.is_dir() {
            self.load_from_dir(source)
        } else {
            self.load_from_archive(source)
        };

        result.map_err(|e| {
            log::debug!("Cannot load manifest from {}: {}", source.display(), e);
            PackageError::PackageLoad {
                location: source.display().to_string(),
                reason: e.to_string(),
            }
        })
    }

    fn load_from_dir(&self, dir: &Path) -> std::result::Result<Manifest, LoadError> {
        for name in MANIFEST_NAMES {
            let path = dir.join(name);
            if path.is_file() {
                let content = fs::read(&path)?;
                let package = parse_bytes(&content)?;
                return Ok(Manifest { package, path });
            }
        }

        Err(LoadError::Missing)
    }

    fn load_from_archive(&self, archive: &Path) -> std::result::Result<Manifest, LoadError> {
        for name in MANIFEST_NAMES {
            if let Some(content) = self.archives.read_entry(archive, name)? {
                let mut package = parse_bytes(&content)?;
                package.checksum = compute_sha1(archive).ok();
                return Ok(Manifest {
                    package,
                    path: archive.join(name),
                });
            }
        }

        Err(LoadError::Missing)
    }
}

/// Parse manifest JSON into a [`Package`]
pub fn parse_manifest(content: &[u8]) -> Result<Package> {
    parse_bytes(content).map_err(|e| PackageError::PackageLoad {
        location: "<manifest>".to_string(),
        reason: e.to_string(),
    })
}

fn parse_bytes(content: &[u8]) -> std::result::Result<Package, LoadError> {
    let package: Package = serde_json::from_slice(content)?;

    if package.name.trim().is_empty() {
        return Err(LoadError::Validation("Package name cannot be empty".to_string()));
    }

    Ok(package)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::PackageType;
    use std::collections::HashMap;
    use std::io;
    use tempfile::TempDir;

    /// Archive backend serving entries from memory
    struct FakeArchive {
        entries: HashMap<&'static str, &'static str>,
    }

    impl ArchiveReader for FakeArchive {
        fn read_entry(&self, _archive: &Path, name: &str) -> io::Result<Option<Vec<u8>>> {
            Ok(self.entries.get(name).map(|s| s.as_bytes().to_vec()))
        }
    }

    struct BrokenArchive;

    impl ArchiveReader for BrokenArchive {
        fn read_entry(&self, _archive: &Path, _name: &str) -> io::Result<Option<Vec<u8>>> {
            Err(io::Error::new(io::ErrorKind::InvalidData, "bad central directory"))
        }
    }

    fn fake_loader(entries: &[(&'static str, &'static str)]) -> ManifestLoader {
        ManifestLoader::with_reader(Arc::new(FakeArchive {
            entries: entries.iter().copied().collect(),
        }))
    }

    const EXTENSION: &str = r#"{
        "name": "blog",
        "type": "extension",
        "title": "Blog",
        "description": "A blog extension",
        "version": "0.9.2",
        "author": "Jane Doe",
        "extra": { "image": "images/icon.svg", "scripts": ["a.js"] }
    }"#;

    const THEME: &str = r#"{ "name": "mytheme", "type": "theme", "version": "1.0" }"#;

    #[test]
    fn test_load_archive_extension_fields() {
        let manifest = fake_loader(&[(EXTENSION_MANIFEST, EXTENSION)])
            .load(Path::new("/uploads/blog.zip"))
            .unwrap();

        let package = manifest.package;
        assert_eq!(package.name, "blog");
        assert_eq!(package.package_type, PackageType::Extension);
        assert_eq!(package.title, "Blog");
        assert_eq!(package.description, "A blog extension");
        assert_eq!(package.version, "0.9.2");
        assert_eq!(package.author, "Jane Doe");
        assert_eq!(package.extra.image.as_deref(), Some("images/icon.svg"));
        assert!(package.extra.other.contains_key("scripts"));
        assert_eq!(manifest.path, Path::new("/uploads/blog.zip/extension.json"));
    }

    #[test]
    fn test_archive_theme_takes_precedence() {
        let manifest = fake_loader(&[(EXTENSION_MANIFEST, EXTENSION), (THEME_MANIFEST, THEME)])
            .load(Path::new("/uploads/both.zip"))
            .unwrap();

        assert_eq!(manifest.package.name, "mytheme");
        assert!(manifest.package.is_theme());
    }

    #[test]
    fn test_archive_without_manifest() {
        let result = fake_loader(&[("README.md", "# hi")]).load(Path::new("/uploads/x.zip"));
        assert!(matches!(result, Err(PackageError::PackageLoad { .. })));
    }

    #[test]
    fn test_unreadable_archive_collapses_to_load_error() {
        let loader = ManifestLoader::with_reader(Arc::new(BrokenArchive));
        let err = loader.load(Path::new("/uploads/x.zip")).unwrap_err();

        assert!(matches!(err, PackageError::PackageLoad { .. }));
        assert_eq!(err.user_message(), "Can't load json file from package.");
    }

    #[test]
    fn test_invalid_manifest_collapses_to_load_error() {
        for content in [
            "{ not json",
            r#"{ "type": "extension" }"#,
            r#"{ "name": "blog", "type": "plugin" }"#,
            r#"{ "name": "  ", "type": "theme" }"#,
        ] {
            let result = fake_loader(&[(EXTENSION_MANIFEST, content)]).load(Path::new("/x.zip"));
            assert!(matches!(result, Err(PackageError::PackageLoad { .. })), "{}", content);
        }
    }

    #[test]
    fn test_load_directory() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join(EXTENSION_MANIFEST), EXTENSION).unwrap();

        let manifest = ManifestLoader::new().load(temp.path()).unwrap();
        assert_eq!(manifest.package.name, "blog");
        assert_eq!(manifest.path, temp.path().join(EXTENSION_MANIFEST));
        assert!(manifest.package.checksum.is_none());
    }

    #[test]
    fn test_directory_theme_takes_precedence() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join(EXTENSION_MANIFEST), EXTENSION).unwrap();
        fs::write(temp.path().join(THEME_MANIFEST), THEME).unwrap();

        let manifest = ManifestLoader::new().load(temp.path()).unwrap();
        assert_eq!(manifest.package.name, "mytheme");
        assert_eq!(manifest.path, temp.path().join(THEME_MANIFEST));
    }

    #[test]
    fn test_missing_source() {
        let temp = TempDir::new().unwrap();
        let result = ManifestLoader::new().load(&temp.path().join("gone"));
        assert!(matches!(result, Err(PackageError::PackageLoad { .. })));
    }

    #[test]
    fn test_parse_manifest() {
        let package = parse_manifest(THEME.as_bytes()).unwrap();
        assert_eq!(package.name, "mytheme");
        assert_eq!(package.version, "1.0");
        assert!(parse_manifest(b"[]").is_err());
    }
}
