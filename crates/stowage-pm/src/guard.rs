//! Protection for core packages.

use std::collections::HashSet;

use crate::config::Config;
use crate::{PackageError, Result};

/// Rejects packages whose name belongs to the configured core set.
///
/// Checked when an upload is validated and again right before an extension
/// is handed to its installer.
#[derive(Debug, Clone, Default)]
pub struct CoreGuard {
    core: HashSet<String>,
}

impl CoreGuard {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            core: names.into_iter().map(Into::into).collect(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.core_packages.iter().cloned())
    }

    pub fn is_core(&self, name: &str) -> bool {
        self.core.contains(name)
    }

    pub fn ensure_not_core(&self, name: &str) -> Result<()> {
        if self.is_core(name) {
            log::warn!("Refusing to touch core package {}", name);
            return Err(PackageError::CoreProtected {
                name: name.to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_core_names_rejected() {
        let guard = CoreGuard::new(["system", "installer"]);

        assert!(matches!(
            guard.ensure_not_core("system"),
            Err(PackageError::CoreProtected { .. })
        ));
        assert!(guard.ensure_not_core("installer").is_err());
        assert!(guard.ensure_not_core("blog").is_ok());
    }

    #[test]
    fn test_match_is_exact() {
        let guard = CoreGuard::new(["system"]);
        assert!(!guard.is_core("System"));
        assert!(!guard.is_core("system-extra"));
        assert!(!guard.is_core(""));
    }

    #[test]
    fn test_from_config() {
        let guard = CoreGuard::from_config(&Config::default());
        assert!(guard.is_core("system"));
    }

    #[test]
    fn test_empty_guard_allows_everything() {
        assert!(CoreGuard::default().ensure_not_core("system").is_ok());
    }
}
