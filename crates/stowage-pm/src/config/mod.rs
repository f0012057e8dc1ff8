//! Configuration management
//!
//! Configuration is resolved from the following sources, highest priority first:
//!
//! 1. Environment variables (`STOWAGE_*`)
//! 2. The `config` section of a `stowage.json` file
//! 3. Built-in defaults
//!
//! # Example
//!
//! ```rust,no_run
//! use stowage_pm::config::Config;
//! use std::path::Path;
//!
//! let config = Config::build(Some(Path::new("/srv/site/stowage.json")), true).unwrap();
//!
//! println!("Temp dir: {:?}", config.temp_dir);
//! println!("Core packages: {:?}", config.core_packages);
//! ```

mod config;
mod source;

pub use config::Config;
pub use source::{ConfigLoader, RawConfig};
