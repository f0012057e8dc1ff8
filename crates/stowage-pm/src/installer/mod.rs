//! Package installation.
//!
//! The installers that actually mutate installed-package state sit behind
//! the traits below. [`InstallCoordinator`] decides which of their methods
//! to call, [`DirectoryInstaller`] is a filesystem-backed implementation.

mod coordinator;
mod directory;

use std::path::Path;
use std::sync::Arc;

use crate::manifest::Package;
use crate::Result;

pub use coordinator::{InstallCoordinator, InstallOutcome};
pub use directory::{DirectoryExtension, DirectoryInstaller, DirectoryRegistry, DISABLED_MARKER};

/// Installs and updates packages of one type
pub trait PackageInstaller: Send + Sync {
    fn is_installed(&self, package: &Package) -> Result<bool>;

    /// Install from the manifest at `manifest`; the package tree is its directory.
    fn install(&self, manifest: &Path) -> Result<()>;

    fn update(&self, manifest: &Path) -> Result<()>;
}

/// A registered, possibly loaded extension
pub trait ExtensionHandle {
    fn is_enabled(&self) -> bool;

    fn disable(&self) -> Result<()>;
}

/// Lookup of currently registered extensions
pub trait ExtensionRegistry: Send + Sync {
    fn lookup(&self, name: &str) -> Option<Box<dyn ExtensionHandle>>;
}

/// The installer collaborators, one per package type
#[derive(Clone)]
pub struct Installers {
    pub themes: Arc<dyn PackageInstaller>,
    pub extensions: Arc<dyn PackageInstaller>,
    pub registry: Arc<dyn ExtensionRegistry>,
}

impl Installers {
    pub fn new(
        themes: Arc<dyn PackageInstaller>,
        extensions: Arc<dyn PackageInstaller>,
        registry: Arc<dyn ExtensionRegistry>,
    ) -> Self {
        Self {
            themes,
            extensions,
            registry,
        }
    }

    /// Filesystem installers rooted at `packages_dir`
    pub fn directory(packages_dir: &Path) -> Self {
        let themes = DirectoryInstaller::themes(packages_dir);
        let extensions = DirectoryInstaller::extensions(packages_dir);
        let registry = DirectoryRegistry::new(extensions.root());

        Self::new(Arc::new(themes), Arc::new(extensions), Arc::new(registry))
    }
}
