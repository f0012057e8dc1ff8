use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{PackageError, Result};

/// Raw configuration data as found in a `stowage.json` file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<serde_json::Map<String, serde_json::Value>>,
}

/// Loads configuration from files and the environment
#[derive(Debug)]
pub struct ConfigLoader {
    use_environment: bool,
}

impl ConfigLoader {
    pub fn new(use_environment: bool) -> Self {
        Self { use_environment }
    }

    /// Get a STOWAGE_* environment variable
    pub fn get_stowage_env(&self, var: &str) -> Option<String> {
        if !self.use_environment {
            return None;
        }

        env::var(var).ok().filter(|s| !s.is_empty())
    }

    /// Get a configuration value from the environment.
    /// Converts "foo-bar" to "STOWAGE_FOO_BAR"
    pub fn get_env_config(&self, key: &str) -> Option<String> {
        let env_var = format!("STOWAGE_{}", key.replace('-', "_").to_uppercase());
        self.get_stowage_env(&env_var)
    }

    /// Get unsigned integer value from environment variable
    pub fn get_env_u64(&self, key: &str) -> Option<u64> {
        self.get_env_config(key).and_then(|val| val.parse().ok())
    }

    pub fn get_env_u32(&self, key: &str) -> Option<u32> {
        self.get_env_config(key).and_then(|val| val.parse().ok())
    }

    /// Get a path value from environment variable
    pub fn get_env_path(&self, key: &str) -> Option<PathBuf> {
        self.get_env_config(key).map(PathBuf::from)
    }

    /// Get a comma separated list from environment variable
    pub fn get_env_list(&self, key: &str) -> Option<Vec<String>> {
        self.get_env_config(key).map(|val| {
            val.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        })
    }

    /// Directory for installed packages when none is configured
    pub fn get_data_dir(&self) -> PathBuf {
        if let Some(proj_dirs) = directories::ProjectDirs::from("", "", "stowage") {
            proj_dirs.data_dir().to_path_buf()
        } else if let Some(base_dirs) = directories::BaseDirs::new() {
            base_dirs.home_dir().join(".stowage")
        } else {
            PathBuf::from(".stowage")
        }
    }

    /// Cache directory when none is configured
    pub fn get_cache_dir(&self) -> PathBuf {
        if let Some(proj_dirs) = directories::ProjectDirs::from("", "", "stowage") {
            proj_dirs.cache_dir().to_path_buf()
        } else {
            self.get_data_dir().join("cache")
        }
    }

    /// Load configuration from a JSON file. A missing file is an empty config.
    pub fn load_config_file<P: AsRef<Path>>(&self, path: P) -> Result<RawConfig> {
        let path = path.as_ref();

        if !path.exists() {
            return Ok(RawConfig::default());
        }

        let contents = fs::read_to_string(path)
            .map_err(|e| PackageError::Config(format!("Failed to read {}: {}", path.display(), e)))?;

        let config: RawConfig = serde_json::from_str(&contents)
            .map_err(|e| PackageError::Config(format!("Failed to parse {}: {}", path.display(), e)))?;

        Ok(config)
    }
}
