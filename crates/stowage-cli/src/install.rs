//! Install command - install an uploaded package or a remote one.

use anyhow::{Context, Result};
use clap::Args;
use console::style;
use serde_json::Value;
use std::io::Read;
use std::path::{Path, PathBuf};

use stowage_pm::{Config, InstallRequest, InstallResponse};

use crate::{package_manager, print_response};

#[derive(Args, Debug)]
pub struct InstallArgs {
    /// Fingerprint returned by a previous upload
    #[arg(long, value_name = "FINGERPRINT", conflicts_with = "package", required_unless_present = "package")]
    pub path: Option<String>,

    /// Remote package object as JSON, read from a file or "-" for stdin
    #[arg(long, value_name = "FILE")]
    pub package: Option<PathBuf>,
}

pub fn execute(args: InstallArgs, config: Config) -> Result<i32> {
    let request = match (args.path, args.package) {
        (Some(path), _) => InstallRequest::Local(path),
        (None, Some(file)) => InstallRequest::Remote(read_descriptor(&file)?),
        (None, None) => InstallRequest::Local(String::new()),
    };

    let manager = package_manager(config)?;

    let response = manager.install(request);
    print_response(&response)?;

    match response {
        InstallResponse::Installed { message } => {
            eprintln!("{} {}", style("Done:").green().bold(), message);
            Ok(0)
        }
        InstallResponse::Error { .. } => Ok(1),
    }
}

fn read_descriptor(file: &Path) -> Result<Value> {
    let content = if file == Path::new("-") {
        let mut buffer = String::new();
        std::io::stdin()
            .read_to_string(&mut buffer)
            .context("Failed to read package from stdin")?;
        buffer
    } else {
        std::fs::read_to_string(file)
            .with_context(|| format!("Failed to read {}", file.display()))?
    };

    serde_json::from_str(&content).context("Package is not valid JSON")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_read_descriptor_from_file() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("package.json");
        std::fs::write(&file, r#"{"dist": {"url": "a.zip", "shasum": "abc"}}"#).unwrap();

        let value = read_descriptor(&file).unwrap();

        assert_eq!(value["dist"]["url"], json!("a.zip"));
    }

    #[test]
    fn test_read_descriptor_rejects_invalid_json() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("package.json");
        std::fs::write(&file, "not json").unwrap();

        assert!(read_descriptor(&file).is_err());
        assert!(read_descriptor(&temp.path().join("missing.json")).is_err());
    }
}
