//! Content-derived names for workspace directories.

use std::fmt;

use serde::Serialize;
use sha1::{Digest, Sha1};

use crate::{PackageError, Result};

/// SHA-1 hex digest naming a workspace under the temp root.
///
/// Identical input always yields the identical fingerprint, so repeated
/// uploads of the same archive address the same workspace.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Fingerprint raw uploaded bytes.
    pub fn of_bytes(bytes: &[u8]) -> Self {
        let mut hasher = Sha1::new();
        hasher.update(bytes);
        Self(format!("{:x}", hasher.finalize()))
    }

    /// Fingerprint a download descriptor by its serialized JSON form.
    pub fn of_descriptor<T: Serialize + ?Sized>(descriptor: &T) -> Result<Self> {
        let json = serde_json::to_vec(descriptor)
            .map_err(|e| PackageError::Validation(format!("Invalid package descriptor: {}", e)))?;
        Ok(Self::of_bytes(&json))
    }

    /// Accept a fingerprint handed back by a caller.
    ///
    /// Only non-empty ASCII alphanumerics are accepted, which keeps the value
    /// a single path component under the temp root.
    pub fn parse(value: &str) -> Result<Self> {
        if value.is_empty() || !value.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(PackageError::PathNotFound(value.to_string()));
        }
        Ok(Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
