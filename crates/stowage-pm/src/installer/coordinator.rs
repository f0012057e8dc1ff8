use std::fmt;
use std::path::Path;

use super::Installers;
use crate::guard::CoreGuard;
use crate::manifest::{Package, PackageType};
use crate::Result;

/// What an install run did to the registry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallOutcome {
    Installed,
    Updated,
}

impl fmt::Display for InstallOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InstallOutcome::Installed => f.write_str("installed"),
            InstallOutcome::Updated => f.write_str("updated"),
        }
    }
}

/// Dispatches a loaded package to the right installer
pub struct InstallCoordinator {
    guard: CoreGuard,
}

impl InstallCoordinator {
    pub fn new(guard: CoreGuard) -> Self {
        Self { guard }
    }

    /// Install `package`, or update it when already installed.
    ///
    /// The first failing call ends the run. Calls that already succeeded are
    /// not undone.
    pub fn install_or_update(
        &self,
        package: &Package,
        manifest: &Path,
        installers: &Installers,
    ) -> Result<InstallOutcome> {
        let outcome = match package.package_type {
            PackageType::Theme => self.install_theme(package, manifest, installers)?,
            PackageType::Extension => self.install_extension(package, manifest, installers)?,
        };

        log::info!("Package {} {} {}", package.package_type, package.name, outcome);
        Ok(outcome)
    }

    fn install_theme(
        &self,
        package: &Package,
        manifest: &Path,
        installers: &Installers,
    ) -> Result<InstallOutcome> {
        let installer = &installers.themes;

        if installer.is_installed(package)? {
            installer.update(manifest)?;
            Ok(InstallOutcome::Updated)
        } else {
            installer.install(manifest)?;
            Ok(InstallOutcome::Installed)
        }
    }

    fn install_extension(
        &self,
        package: &Package,
        manifest: &Path,
        installers: &Installers,
    ) -> Result<InstallOutcome> {
        self.guard.ensure_not_core(&package.name)?;

        let installer = &installers.extensions;

        if installer.is_installed(package)? {
            // Never update underneath a live extension
            if let Some(extension) = installers.registry.lookup(&package.name) {
                if extension.is_enabled() {
                    log::debug!("Disabling {} before update", package.name);
                    extension.disable()?;
                }
            }

            installer.update(manifest)?;
            Ok(InstallOutcome::Updated)
        } else {
            installer.install(manifest)?;
            Ok(InstallOutcome::Installed)
        }
    }
}
