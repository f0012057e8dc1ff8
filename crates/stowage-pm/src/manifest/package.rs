use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Asset shown for packages that do not ship an `image`
pub const PLACEHOLDER_IMAGE: &str = "extensions/system/assets/images/placeholder-icon.svg";

/// Kind of package, decides which installer handles it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PackageType {
    Extension,
    Theme,
}

impl PackageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PackageType::Extension => "extension",
            PackageType::Theme => "theme",
        }
    }
}

impl fmt::Display for PackageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A package as described by its manifest.
///
/// `checksum` is never read from the manifest; the loader fills it in with
/// the digest of the archive the manifest came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Package {
    pub name: String,

    #[serde(rename = "type")]
    pub package_type: PackageType,

    #[serde(default)]
    pub title: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub version: String,

    #[serde(default)]
    pub author: String,

    #[serde(skip)]
    pub checksum: Option<String>,

    #[serde(default)]
    pub extra: PackageExtra,
}

impl Package {
    pub fn new(name: impl Into<String>, package_type: PackageType) -> Self {
        Self {
            name: name.into(),
            package_type,
            title: String::new(),
            description: String::new(),
            version: String::new(),
            author: String::new(),
            checksum: None,
            extra: PackageExtra::default(),
        }
    }

    pub fn is_theme(&self) -> bool {
        self.package_type == PackageType::Theme
    }
}

/// The manifest's open `extra` map.
///
/// `image` is a path relative to the package root. Unknown keys are kept in
/// their original order so the map serializes back as it was read.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PackageExtra {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,

    #[serde(flatten)]
    pub other: IndexMap<String, serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_package_type_serde() {
        assert_eq!(serde_json::to_value(PackageType::Theme).unwrap(), json!("theme"));
        let parsed: PackageType = serde_json::from_value(json!("extension")).unwrap();
        assert_eq!(parsed, PackageType::Extension);
        assert!(serde_json::from_value::<PackageType>(json!("plugin")).is_err());
    }

    #[test]
    fn test_extra_keeps_unknown_keys_in_order() {
        let extra: PackageExtra = serde_json::from_value(json!({
            "zeta": 1,
            "image": "images/icon.svg",
            "alpha": { "nested": true }
        }))
        .unwrap();

        assert_eq!(extra.image.as_deref(), Some("images/icon.svg"));
        let keys: Vec<_> = extra.other.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["zeta", "alpha"]);

        let back = serde_json::to_value(&extra).unwrap();
        assert_eq!(back["alpha"]["nested"], json!(true));
        assert_eq!(back["image"], json!("images/icon.svg"));
    }

    #[test]
    fn test_checksum_not_read_from_manifest() {
        let package: Package = serde_json::from_value(json!({
            "name": "blog",
            "type": "extension",
            "checksum": "deadbeef"
        }))
        .unwrap();

        assert!(package.checksum.is_none());
        assert_eq!(package.title, "");
        assert!(package.extra.image.is_none());
    }
}
