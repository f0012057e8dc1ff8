//! Directory installer - installs packages into `<packages-dir>/<type>s/<name>`.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use super::{ExtensionHandle, ExtensionRegistry, PackageInstaller};
use crate::manifest::{parse_manifest, Package, PackageType};
use crate::{PackageError, Result};

/// Marker file whose presence means an installed extension is disabled
pub const DISABLED_MARKER: &str = ".disabled";

/// Copies a package tree from one directory to another
type CopyFn = fn(&Path, &Path) -> io::Result<()>;

/// Filesystem installer for one package type.
///
/// Trees are copied into a hidden staging directory next to the target and
/// renamed into place, so a failed copy never leaves a partial package.
pub struct DirectoryInstaller {
    root: PathBuf,
    package_type: PackageType,
    copy: CopyFn,
}

impl DirectoryInstaller {
    pub fn new(root: impl Into<PathBuf>, package_type: PackageType) -> Self {
        Self {
            root: root.into(),
            package_type,
            copy: copy_tree,
        }
    }

    pub fn themes(packages_dir: &Path) -> Self {
        Self::new(packages_dir.join("themes"), PackageType::Theme)
    }

    pub fn extensions(packages_dir: &Path) -> Self {
        Self::new(packages_dir.join("extensions"), PackageType::Extension)
    }

    /// Directory packages of this type are installed under
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Get the install path for a package
    pub fn get_install_path(&self, name: &str) -> Result<PathBuf> {
        if !is_valid_name(name) {
            return Err(installer_error(name, "name is not a valid directory name"));
        }
        Ok(self.root.join(name))
    }

    /// Read the manifest and work out where its package goes
    fn target_for(&self, manifest: &Path) -> Result<(Package, PathBuf, PathBuf)> {
        let content = fs::read(manifest).map_err(|e| {
            installer_error(&manifest.display().to_string(), e)
        })?;
        let package = parse_manifest(&content)?;

        if package.package_type != self.package_type {
            return Err(installer_error(
                &package.name,
                format!("is a {}, expected a {}", package.package_type, self.package_type),
            ));
        }

        let source = manifest
            .parent()
            .map(Path::to_path_buf)
            .ok_or_else(|| installer_error(&package.name, "manifest has no parent directory"))?;
        let target = self.get_install_path(&package.name)?;

        Ok((package, source, target))
    }

    /// Sibling of the install path used while a tree is being swapped in
    fn sibling(&self, name: &str, suffix: &str) -> PathBuf {
        self.root.join(format!(".{}.{}", name, suffix))
    }

    /// Copy `source` into a fresh staging directory and return its path
    fn stage(&self, name: &str, source: &Path) -> Result<PathBuf> {
        let staging = self.sibling(name, "tmp");
        remove_tree(&staging).map_err(|e| installer_error(name, e))?;

        if let Err(e) = (self.copy)(source, &staging) {
            if let Err(cleanup) = remove_tree(&staging) {
                log::warn!("Failed to remove {}: {}", staging.display(), cleanup);
            }
            return Err(installer_error(name, e));
        }

        Ok(staging)
    }
}

impl PackageInstaller for DirectoryInstaller {
    fn is_installed(&self, package: &Package) -> Result<bool> {
        Ok(self.get_install_path(&package.name)?.is_dir())
    }

    fn install(&self, manifest: &Path) -> Result<()> {
        let (package, source, target) = self.target_for(manifest)?;

        if target.exists() {
            return Err(installer_error(&package.name, "already installed"));
        }

        let staging = self.stage(&package.name, &source)?;
        if let Err(e) = fs::rename(&staging, &target) {
            if let Err(cleanup) = remove_tree(&staging) {
                log::warn!("Failed to remove {}: {}", staging.display(), cleanup);
            }
            return Err(installer_error(&package.name, e));
        }

        log::debug!("Installed {} to {}", package.name, target.display());
        Ok(())
    }

    fn update(&self, manifest: &Path) -> Result<()> {
        let (package, source, target) = self.target_for(manifest)?;
        let name = package.name.as_str();

        let staging = self.stage(name, &source)?;

        let swap = || -> io::Result<()> {
            if target.join(DISABLED_MARKER).exists() {
                fs::write(staging.join(DISABLED_MARKER), b"")?;
            }

            // Set the old version aside, restore it if the new one can't move in
            let backup = self.sibling(name, "old");
            let had_previous = target.exists();
            if had_previous {
                remove_tree(&backup)?;
                fs::rename(&target, &backup)?;
            }

            if let Err(e) = fs::rename(&staging, &target) {
                if had_previous {
                    fs::rename(&backup, &target)?;
                }
                return Err(e);
            }

            if had_previous {
                if let Err(e) = remove_tree(&backup) {
                    log::warn!("Failed to remove {}: {}", backup.display(), e);
                }
            }
            Ok(())
        };

        if let Err(e) = swap() {
            if let Err(cleanup) = remove_tree(&staging) {
                log::warn!("Failed to remove {}: {}", staging.display(), cleanup);
            }
            return Err(installer_error(name, e));
        }

        log::debug!("Updated {} in {}", name, target.display());
        Ok(())
    }
}

/// Extension registry backed by the extensions directory
pub struct DirectoryRegistry {
    root: PathBuf,
}

impl DirectoryRegistry {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The installed extension called `name`, if any
    pub fn extension(&self, name: &str) -> Option<DirectoryExtension> {
        if !is_valid_name(name) {
            return None;
        }

        let path = self.root.join(name);
        path.is_dir().then(|| DirectoryExtension { path })
    }
}

impl ExtensionRegistry for DirectoryRegistry {
    fn lookup(&self, name: &str) -> Option<Box<dyn ExtensionHandle>> {
        self.extension(name)
            .map(|extension| Box::new(extension) as Box<dyn ExtensionHandle>)
    }
}

/// An installed extension directory
pub struct DirectoryExtension {
    path: PathBuf,
}

impl DirectoryExtension {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn enable(&self) -> Result<()> {
        let marker = self.path.join(DISABLED_MARKER);
        if marker.exists() {
            fs::remove_file(&marker).map_err(|e| installer_error(&self.name(), e))?;
        }
        Ok(())
    }

    fn name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

impl ExtensionHandle for DirectoryExtension {
    fn is_enabled(&self) -> bool {
        !self.path.join(DISABLED_MARKER).exists()
    }

    fn disable(&self) -> Result<()> {
        fs::write(self.path.join(DISABLED_MARKER), b"")
            .map_err(|e| installer_error(&self.name(), e))
    }
}

/// Copy a directory tree, skipping symlinks
fn copy_tree(from: &Path, to: &Path) -> io::Result<()> {
    for entry in WalkDir::new(from) {
        let entry = entry.map_err(io::Error::from)?;
        let relative = entry
            .path()
            .strip_prefix(from)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
        let target = to.join(relative);

        let file_type = entry.file_type();
        if file_type.is_dir() {
            fs::create_dir_all(&target)?;
        } else if file_type.is_file() {
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::copy(entry.path(), &target)?;
        } else {
            log::debug!("Skipping {}", entry.path().display());
        }
    }

    Ok(())
}

/// Remove a directory tree if it exists
fn remove_tree(path: &Path) -> io::Result<()> {
    if path.exists() {
        fs::remove_dir_all(path)?;
    }
    Ok(())
}

/// A name usable as a single, non-hidden directory component
fn is_valid_name(name: &str) -> bool {
    !name.is_empty() && !name.starts_with('.') && !name.contains(['/', '\\'])
}

fn installer_error(package: &str, reason: impl ToString) -> PackageError {
    PackageError::Installer {
        package: package.to_string(),
        reason: reason.to_string(),
    }
}
