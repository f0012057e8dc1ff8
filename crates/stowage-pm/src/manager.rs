//! Upload and install entry points.
//!
//! [`PackageManager`] runs one pipeline per call and answers with a response
//! value that is either a success or an error, never both. Errors from the
//! lower layers are translated to user text here and nowhere else.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use crate::cache::{CacheInvalidator, NoopCache};
use crate::config::Config;
use crate::downloader::{ArchiveExtractor, FileDownloader};
use crate::fingerprint::Fingerprint;
use crate::guard::CoreGuard;
use crate::http::{HttpClient, HttpClientConfig, Transport};
use crate::installer::{InstallCoordinator, Installers};
use crate::manifest::{ManifestLoader, Package, PackageExtra, PackageType, PLACEHOLDER_IMAGE};
use crate::workspace::{Workspace, WorkspaceGuard, WorkspaceLocks};
use crate::{PackageError, Result};

/// What the install entry should install
#[derive(Debug, Clone)]
pub enum InstallRequest {
    /// A package object from the remote API. Its `dist.url` and `dist.shasum`
    /// drive the download; the whole object names the workspace.
    Remote(Value),
    /// A fingerprint returned by an earlier upload
    Local(String),
}

/// The part of a remote package object the downloader needs
#[derive(Debug, Clone, Deserialize)]
pub struct DownloadDescriptor {
    pub dist: Dist,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Dist {
    pub url: String,
    pub shasum: String,
}

/// Package as reported back to the uploader
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PackageSummary {
    pub name: String,
    #[serde(rename = "type")]
    pub package_type: PackageType,
    pub title: String,
    pub description: String,
    pub version: String,
    pub author: String,
    pub shasum: String,
    pub extra: PackageExtra,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum UploadResponse {
    Uploaded {
        package: PackageSummary,
        install: String,
    },
    Error {
        error: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum InstallResponse {
    Installed { message: String },
    Error { error: String },
}

impl InstallResponse {
    pub fn is_success(&self) -> bool {
        matches!(self, InstallResponse::Installed { .. })
    }
}

pub struct PackageManager {
    config: Config,
    guard: CoreGuard,
    coordinator: InstallCoordinator,
    loader: ManifestLoader,
    downloader: FileDownloader,
    workspace: Workspace,
    installers: Installers,
    cache: Arc<dyn CacheInvalidator>,
}

impl PackageManager {
    /// Create a manager downloading over HTTP as configured
    pub fn new(config: Config, installers: Installers) -> Result<Self> {
        let http = HttpClient::with_config(HttpClientConfig::from(&config))
            .map_err(|e| PackageError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self::with_transport(config, installers, Arc::new(http)))
    }

    /// Create a manager downloading through `transport`
    pub fn with_transport(
        config: Config,
        installers: Installers,
        transport: Arc<dyn Transport>,
    ) -> Self {
        let guard = CoreGuard::from_config(&config);
        let workspace = Workspace::new(config.temp_dir.clone(), Arc::new(WorkspaceLocks::new()));

        Self {
            coordinator: InstallCoordinator::new(guard.clone()),
            guard,
            loader: ManifestLoader::new(),
            downloader: FileDownloader::new(transport),
            workspace,
            installers,
            cache: Arc::new(NoopCache),
            config,
        }
    }

    /// Set the cache invalidated after each successful install
    pub fn with_cache(mut self, cache: Arc<dyn CacheInvalidator>) -> Self {
        self.cache = cache;
        self
    }

    /// Validate an uploaded archive and unpack it for a later install.
    ///
    /// The workspace is left in place; its fingerprint is returned as
    /// `install` for the caller to hand to [`PackageManager::install`].
    pub fn upload(&self, file: Option<&Path>, declared_type: Option<&str>) -> UploadResponse {
        match self.run_upload(file, declared_type) {
            Ok((package, install)) => {
                log::info!("Uploaded {} {} as {}", package.package_type, package.name, install);
                UploadResponse::Uploaded { package, install }
            }
            Err(e) => {
                log::warn!("Upload failed: {}", e);
                UploadResponse::Error {
                    error: e.user_message(),
                }
            }
        }
    }

    fn run_upload(
        &self,
        file: Option<&Path>,
        declared_type: Option<&str>,
    ) -> Result<(PackageSummary, String)> {
        let no_file = || PackageError::Validation("No file uploaded.".to_string());

        let upload = file.filter(|path| path.is_file()).ok_or_else(no_file)?;
        let bytes = fs::read(upload).map_err(|_| no_file())?;

        let package = self.loader.load(upload)?.package;

        if declared_type != Some(package.package_type.as_str()) {
            return Err(PackageError::InvalidPackageType {
                expected: declared_type.unwrap_or_default().to_string(),
                found: package.package_type.to_string(),
            });
        }

        self.guard.ensure_not_core(&package.name)?;

        let fingerprint = Fingerprint::of_bytes(&bytes);
        let extra = self.expose_extra(&package.extra, &fingerprint)?;

        let workspace = self.workspace.acquire(&fingerprint)?;
        ArchiveExtractor::extract(upload, workspace.dir())?;
        let install = workspace.persist();

        let shasum = package
            .checksum
            .clone()
            .unwrap_or_else(|| install.to_string());

        let summary = PackageSummary {
            name: package.name,
            package_type: package.package_type,
            title: package.title,
            description: package.description,
            version: package.version,
            author: package.author,
            shasum,
            extra,
        };

        Ok((summary, install.to_string()))
    }

    /// Download or pick up a package, install or update it, and remove its
    /// workspace whatever the outcome.
    pub fn install(&self, request: InstallRequest) -> InstallResponse {
        let (fingerprint, dist) = match self.resolve(request) {
            Ok(target) => target,
            Err(e) => {
                log::warn!("Install failed: {}", e);
                return InstallResponse::Error {
                    error: e.user_message(),
                };
            }
        };

        let workspace = match self.workspace.acquire(&fingerprint) {
            Ok(workspace) => workspace,
            Err(e) => {
                log::warn!("Install of {} failed: {}", fingerprint, e);
                return InstallResponse::Error {
                    error: e.user_message(),
                };
            }
        };

        let response = match self.run_install(&workspace, dist.as_ref()) {
            Ok(package) => InstallResponse::Installed {
                message: format!("Package \"{}\" installed.", package.name),
            },
            Err(e) => {
                log::warn!("Install of {} failed: {}", fingerprint, e);
                InstallResponse::Error {
                    error: e.user_message(),
                }
            }
        };

        drop(workspace);
        response
    }

    fn resolve(&self, request: InstallRequest) -> Result<(Fingerprint, Option<Dist>)> {
        match request {
            InstallRequest::Remote(package)
                if package.get("dist").is_some_and(|dist| !dist.is_null()) =>
            {
                let descriptor: DownloadDescriptor = serde_json::from_value(package.clone())
                    .map_err(|e| {
                        log::debug!("Invalid package descriptor: {}", e);
                        PackageError::Validation("Invalid package.".to_string())
                    })?;
                let fingerprint = Fingerprint::of_descriptor(&package)?;
                Ok((fingerprint, Some(descriptor.dist)))
            }
            InstallRequest::Remote(_) => Err(PackageError::PathNotFound(String::new())),
            InstallRequest::Local(path) => Ok((Fingerprint::parse(&path)?, None)),
        }
    }

    fn run_install(
        &self,
        workspace: &WorkspaceGuard,
        dist: Option<&Dist>,
    ) -> Result<Package> {
        if let Some(dist) = dist {
            let url = self.config.resolve_download_url(&dist.url)?;
            self.downloader.fetch(
                workspace.archive_path(),
                &url,
                &dist.shasum,
                self.config.api_key.as_deref(),
            )?;
            ArchiveExtractor::extract(workspace.archive_path(), workspace.dir())?;
        }

        let manifest = self.loader.load(workspace.dir())?;
        self.coordinator
            .install_or_update(&manifest.package, &manifest.path, &self.installers)?;

        if let Err(e) = self.cache.clear() {
            log::warn!("Failed to clear cache: {}", e);
        }

        Ok(manifest.package)
    }

    /// Rewrite `extra.image` to a public URL inside the uploaded workspace,
    /// or to the placeholder when the package has none.
    fn expose_extra(&self, extra: &PackageExtra, fingerprint: &Fingerprint) -> Result<PackageExtra> {
        let image = extra
            .image
            .as_deref()
            .map(|image| image.trim_start_matches('/'))
            .filter(|image| !image.is_empty());

        let url = match image {
            Some(image) if !image.split('/').any(|part| part == "..") => self
                .config
                .temp_url()?
                .join(&format!("{}/{}", fingerprint, image)),
            Some(image) => {
                log::debug!("Ignoring image outside of package: {}", image);
                self.config.base_url()?.join(PLACEHOLDER_IMAGE)
            }
            None => self.config.base_url()?.join(PLACEHOLDER_IMAGE),
        }
        .map_err(|e| PackageError::Config(format!("Invalid resource URL: {}", e)))?;

        let mut exposed = extra.clone();
        exposed.image = Some(url.to_string());
        Ok(exposed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn manager(temp: &TempDir) -> PackageManager {
        let mut config = Config::with_base_dir(temp.path());
        config.temp_dir = temp.path().join("tmp");
        config.base_url = "https://example.com/".to_string();
        let installers = Installers::directory(&temp.path().join("packages"));
        PackageManager::new(config, installers).unwrap()
    }

    #[test]
    fn test_expose_extra_rewrites_image() {
        let temp = TempDir::new().unwrap();
        let fp = Fingerprint::of_bytes(b"pkg");
        let mut extra = PackageExtra::default();
        extra.image = Some("images/icon.svg".to_string());
        extra.other.insert("color".to_string(), json!("red"));

        let exposed = manager(&temp).expose_extra(&extra, &fp).unwrap();

        assert_eq!(
            exposed.image.as_deref(),
            Some(format!("https://example.com/tmp/{}/images/icon.svg", fp).as_str())
        );
        assert_eq!(exposed.other.get("color"), Some(&json!("red")));
    }

    #[test]
    fn test_expose_extra_placeholder() {
        let temp = TempDir::new().unwrap();
        let fp = Fingerprint::of_bytes(b"pkg");

        let exposed = manager(&temp).expose_extra(&PackageExtra::default(), &fp).unwrap();
        assert_eq!(
            exposed.image.as_deref(),
            Some("https://example.com/extensions/system/assets/images/placeholder-icon.svg")
        );

        let mut escaping = PackageExtra::default();
        escaping.image = Some("../../secret.png".to_string());
        let exposed = manager(&temp).expose_extra(&escaping, &fp).unwrap();
        assert!(exposed.image.unwrap().ends_with("placeholder-icon.svg"));
    }

    #[test]
    fn test_remote_without_dist_is_path_not_found() {
        let temp = TempDir::new().unwrap();
        let manager = manager(&temp);

        for descriptor in [json!({ "name": "blog" }), json!({ "name": "blog", "dist": null })] {
            let response = manager.install(InstallRequest::Remote(descriptor));
            assert_eq!(
                response,
                InstallResponse::Error {
                    error: "Path not found.".to_string()
                }
            );
        }
    }

    #[test]
    fn test_local_path_must_be_alphanumeric() {
        let temp = TempDir::new().unwrap();
        let manager = manager(&temp);

        for path in ["", "../packages", "abc/def"] {
            let response = manager.install(InstallRequest::Local(path.to_string()));
            assert_eq!(
                response,
                InstallResponse::Error {
                    error: "Path not found.".to_string()
                }
            );
        }
    }

    #[test]
    fn test_response_shapes() {
        let ok = serde_json::to_value(InstallResponse::Installed {
            message: "Package \"blog\" installed.".to_string(),
        })
        .unwrap();
        assert_eq!(ok, json!({ "message": "Package \"blog\" installed." }));

        let err = serde_json::to_value(UploadResponse::Error {
            error: "Invalid package type.".to_string(),
        })
        .unwrap();
        assert_eq!(err, json!({ "error": "Invalid package type." }));
    }
}
