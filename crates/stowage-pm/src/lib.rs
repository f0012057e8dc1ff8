pub mod cache;
pub mod config;
pub mod downloader;
pub mod error;
pub mod fingerprint;
pub mod guard;
pub mod http;
pub mod installer;
pub mod manager;
pub mod manifest;
pub mod util;
pub mod workspace;

pub use error::{PackageError, Result};
pub use cache::{CacheDir, CacheInvalidator, NoopCache};
pub use config::Config;
pub use downloader::{ArchiveExtractor, FileDownloader};
pub use fingerprint::Fingerprint;
pub use guard::CoreGuard;
pub use installer::{InstallCoordinator, InstallOutcome, Installers};
pub use manager::{InstallRequest, InstallResponse, PackageManager, UploadResponse};
pub use manifest::{Manifest, ManifestLoader, Package, PackageExtra, PackageType};
pub use workspace::{Workspace, WorkspaceGuard, WorkspaceLocks};
