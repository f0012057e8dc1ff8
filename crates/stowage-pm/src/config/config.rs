use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use url::Url;

use super::source::{ConfigLoader, RawConfig};
use crate::error::{PackageError, Result};
use crate::util::normalize_path;

fn default_temp_dir() -> PathBuf {
    std::env::temp_dir().join("stowage")
}

fn default_packages_dir() -> PathBuf {
    ConfigLoader::new(false).get_data_dir().join("packages")
}

fn default_cache_dir() -> PathBuf {
    ConfigLoader::new(false).get_cache_dir()
}

fn default_base_url() -> String {
    "http://localhost/".to_string()
}

fn default_core_packages() -> Vec<String> {
    vec!["system".to_string()]
}

fn default_timeout() -> u64 {
    30
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_max_retries() -> u32 {
    3
}

/// Configuration injected into the pipeline components
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    // Directories
    #[serde(rename = "temp-dir", default = "default_temp_dir")]
    pub temp_dir: PathBuf,

    #[serde(rename = "packages-dir", default = "default_packages_dir")]
    pub packages_dir: PathBuf,

    #[serde(rename = "cache-dir", default = "default_cache_dir")]
    pub cache_dir: PathBuf,

    // Remote API
    #[serde(rename = "api-url", skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,

    #[serde(rename = "api-key", skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    // Public URLs
    #[serde(rename = "base-url", default = "default_base_url")]
    pub base_url: String,

    /// Public URL the temp directory is served from, `<base-url>/tmp/` when unset
    #[serde(rename = "temp-url", skip_serializing_if = "Option::is_none")]
    pub temp_url: Option<String>,

    // Packages that may never be installed or updated
    #[serde(rename = "core-packages", default = "default_core_packages")]
    pub core_packages: Vec<String>,

    // HTTP
    #[serde(rename = "timeout", default = "default_timeout")]
    pub timeout: u64,

    #[serde(rename = "connect-timeout", default = "default_connect_timeout")]
    pub connect_timeout: u64,

    #[serde(rename = "max-retries", default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(rename = "proxy", skip_serializing_if = "Option::is_none")]
    pub proxy: Option<String>,

    /// Directory relative paths are resolved against
    #[serde(skip)]
    base_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            temp_dir: default_temp_dir(),
            packages_dir: default_packages_dir(),
            cache_dir: default_cache_dir(),
            api_url: None,
            api_key: None,
            base_url: default_base_url(),
            temp_url: None,
            core_packages: default_core_packages(),
            timeout: default_timeout(),
            connect_timeout: default_connect_timeout(),
            max_retries: default_max_retries(),
            proxy: None,
            base_dir: None,
        }
    }
}

impl Config {
    /// Create a new Config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new Config with defaults and base directory
    pub fn with_base_dir<P: AsRef<Path>>(base_dir: P) -> Self {
        let mut config = Self::default();
        config.base_dir = Some(base_dir.as_ref().to_path_buf());
        config
    }

    /// Build configuration from all sources (defaults, config file, env)
    pub fn build(config_file: Option<&Path>, use_environment: bool) -> Result<Self> {
        let loader = ConfigLoader::new(use_environment);
        let mut config = Self::default();

        // 1. Config file, relative paths in it are relative to the file
        if let Some(path) = config_file {
            config.base_dir = path.parent().map(Path::to_path_buf);
            let raw = loader.load_config_file(path)?;
            config.merge_raw_config(raw)?;
        }

        // 2. Environment overrides
        if use_environment {
            config.apply_env_overrides(&loader);
        }

        // 3. Absolute paths everywhere, the workspace safety check relies on it
        if config.base_dir.is_none() {
            config.base_dir = std::env::current_dir().ok();
        }
        config.resolve_paths();

        Ok(config)
    }

    /// Get base directory
    pub fn base_dir(&self) -> Option<&Path> {
        self.base_dir.as_deref()
    }

    /// Public URL of the application root
    pub fn base_url(&self) -> Result<Url> {
        parse_dir_url(&self.base_url)
    }

    /// Public URL the temp directory is served from
    pub fn temp_url(&self) -> Result<Url> {
        match self.temp_url {
            Some(ref url) => parse_dir_url(url),
            None => self
                .base_url()?
                .join("tmp/")
                .map_err(|e| PackageError::Config(format!("Invalid temp-url: {}", e))),
        }
    }

    /// Resolve a `dist.url` that may be relative to the package API
    pub fn resolve_download_url(&self, url: &str) -> Result<String> {
        if Url::parse(url).is_ok() {
            return Ok(url.to_string());
        }

        let api = self.api_url.as_deref().ok_or_else(|| PackageError::Download {
            url: url.to_string(),
            reason: "relative URL without api-url".to_string(),
        })?;

        parse_dir_url(api)?
            .join(url.trim_start_matches('/'))
            .map(String::from)
            .map_err(|e| PackageError::Download {
                url: url.to_string(),
                reason: e.to_string(),
            })
    }

    fn merge_raw_config(&mut self, raw: RawConfig) -> Result<()> {
        let Some(values) = raw.config else {
            return Ok(());
        };

        let base_dir = self.base_dir.take();
        let mut merged = serde_json::to_value(&*self)
            .map_err(|e| PackageError::Config(e.to_string()))?;

        if let Some(object) = merged.as_object_mut() {
            for (key, value) in values {
                log::debug!("Config {} set from file", key);
                object.insert(key, value);
            }
        }

        *self = serde_json::from_value(merged)
            .map_err(|e| PackageError::Config(e.to_string()))?;
        self.base_dir = base_dir;

        Ok(())
    }

    fn apply_env_overrides(&mut self, loader: &ConfigLoader) {
        if let Some(path) = loader.get_env_path("temp-dir") {
            self.temp_dir = path;
        }
        if let Some(path) = loader.get_env_path("packages-dir") {
            self.packages_dir = path;
        }
        if let Some(path) = loader.get_env_path("cache-dir") {
            self.cache_dir = path;
        }
        if let Some(url) = loader.get_env_config("api-url") {
            self.api_url = Some(url);
        }
        if let Some(key) = loader.get_env_config("api-key") {
            self.api_key = Some(key);
        }
        if let Some(url) = loader.get_env_config("base-url") {
            self.base_url = url;
        }
        if let Some(url) = loader.get_env_config("temp-url") {
            self.temp_url = Some(url);
        }
        if let Some(names) = loader.get_env_list("core-packages") {
            self.core_packages = names;
        }
        if let Some(timeout) = loader.get_env_u64("timeout") {
            self.timeout = timeout;
        }
        if let Some(timeout) = loader.get_env_u64("connect-timeout") {
            self.connect_timeout = timeout;
        }
        if let Some(retries) = loader.get_env_u32("max-retries") {
            self.max_retries = retries;
        }
        if let Some(proxy) = loader.get_env_config("proxy") {
            self.proxy = Some(proxy);
        }
    }

    fn resolve_paths(&mut self) {
        self.temp_dir = self.resolve_path(&self.temp_dir);
        self.packages_dir = self.resolve_path(&self.packages_dir);
        self.cache_dir = self.resolve_path(&self.cache_dir);
    }

    /// Resolve a path relative to base_dir if not absolute, then normalize it
    fn resolve_path(&self, path: &Path) -> PathBuf {
        let resolved = match self.base_dir {
            Some(ref base) if !path.is_absolute() => base.join(path),
            _ => path.to_path_buf(),
        };
        normalize_path(&resolved)
    }
}

/// Parse a URL meant to be joined onto, forcing a trailing slash
fn parse_dir_url(value: &str) -> Result<Url> {
    let value = if value.ends_with('/') {
        value.to_string()
    } else {
        format!("{}/", value)
    };

    Url::parse(&value).map_err(|e| PackageError::Config(format!("Invalid URL {}: {}", value, e)))
}
