// Package manifests
//
// A package ships one of two manifest files at its root, `theme.json` or
// `extension.json`. This module models their contents and locates them in
// a directory or directly inside an archive.

mod loader;
mod package;

pub use loader::{parse_manifest, Manifest, ManifestLoader, EXTENSION_MANIFEST, THEME_MANIFEST};
pub use package::{Package, PackageExtra, PackageType, PLACEHOLDER_IMAGE};
