use thiserror::Error;

#[derive(Error, Debug)]
pub enum PackageError {
    // Archive errors
    #[error("Failed to extract {archive}: {reason}")]
    ArchiveExtraction { archive: String, reason: String },

    // Download errors
    #[error("Checksum mismatch for {url}")]
    ChecksumVerification { url: String },

    #[error("Download rejected for {url}: invalid credential")]
    UnauthorizedDownload { url: String },

    #[error("Download failed for {url}: {reason}")]
    Download { url: String, reason: String },

    #[error("Path is not writable: {path}: {reason}")]
    NotWritable { path: String, reason: String },

    // Manifest errors
    #[error("Cannot load manifest from {location}: {reason}")]
    PackageLoad { location: String, reason: String },

    // Validation errors
    #[error("Package {name} is a core package")]
    CoreProtected { name: String },

    #[error("Invalid package type: expected {expected}, found {found}")]
    InvalidPackageType { expected: String, found: String },

    #[error("Workspace path not found: {0:?}")]
    PathNotFound(String),

    #[error("{0}")]
    Validation(String),

    // Collaborator errors
    #[error("Installer failed for {package}: {reason}")]
    Installer { package: String, reason: String },

    // Config errors
    #[error("Configuration error: {0}")]
    Config(String),
}

impl PackageError {
    /// Text shown to the caller. Internal detail stays in `Display`, which is
    /// only ever logged.
    pub fn user_message(&self) -> String {
        match self {
            PackageError::ArchiveExtraction { .. } => "Package extraction failed.".to_string(),
            PackageError::ChecksumVerification { .. } => {
                "Package checksum verification failed.".to_string()
            }
            PackageError::UnauthorizedDownload { .. } => "Invalid API key.".to_string(),
            PackageError::Download { .. } => "Package download failed.".to_string(),
            PackageError::NotWritable { .. } => "Path is not writable.".to_string(),
            PackageError::PackageLoad { .. } => "Can't load json file from package.".to_string(),
            PackageError::CoreProtected { .. } => {
                "Core extensions may not be installed.".to_string()
            }
            PackageError::InvalidPackageType { .. } => "Invalid package type.".to_string(),
            PackageError::PathNotFound(_) => "Path not found.".to_string(),
            PackageError::Validation(message) => message.clone(),
            PackageError::Installer { .. } => "Package installation failed.".to_string(),
            PackageError::Config(_) => "Invalid configuration.".to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, PackageError>;
