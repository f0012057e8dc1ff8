mod clear_cache;
mod enable;
mod install;
mod upload;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use stowage_pm::{CacheDir, Config, Installers, PackageManager};

#[derive(Parser, Debug)]
#[command(name = "stowage")]
#[command(about = "Upload and install extension and theme packages")]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (JSON, settings under a "config" key)
    #[arg(short = 'c', long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short = 'v', long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Validate an uploaded package archive and unpack it for installation
    Upload(upload::UploadArgs),

    /// Install a previously uploaded package or download one from the API
    Install(install::InstallArgs),

    /// Re-enable an installed extension, e.g. after an update disabled it
    Enable(enable::EnableArgs),

    /// Clear the application cache
    ClearCache(clear_cache::ClearCacheArgs),
}

fn init_logger(verbose: u8) {
    let level = match verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        _ => log::LevelFilter::Debug,
    };

    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .format_target(false)
        .init();
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    Config::build(path, true).context("Failed to load configuration")
}

/// Wire the library to the filesystem installers and the configured cache
fn package_manager(config: Config) -> Result<PackageManager> {
    let installers = Installers::directory(&config.packages_dir);
    let cache = CacheDir::new(&config.cache_dir);

    let manager = PackageManager::new(config, installers)
        .context("Failed to create package manager")?
        .with_cache(std::sync::Arc::new(cache));

    Ok(manager)
}

/// Print a response as JSON on stdout
fn print_response<T: Serialize>(response: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(response).context("Failed to encode response")?;
    println!("{}", json);
    Ok(())
}

fn run() -> Result<i32> {
    let args = Args::parse();
    init_logger(args.verbose);

    let config = load_config(args.config.as_deref())?;

    match args.command {
        Commands::Upload(upload_args) => upload::execute(upload_args, config),
        Commands::Install(install_args) => install::execute(install_args, config),
        Commands::Enable(enable_args) => enable::execute(enable_args, config),
        Commands::ClearCache(clear_args) => clear_cache::execute(clear_args, config),
    }
}

fn main() -> ExitCode {
    match run() {
        Ok(code) => ExitCode::from(code as u8),
        Err(e) => {
            eprintln!("Error: {}", e);
            for cause in e.chain().skip(1) {
                eprintln!("  Caused by: {}", cause);
            }
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let args = Args::try_parse_from([
            "stowage",
            "install",
            "--path",
            "abc123",
            "-vv",
            "--config",
            "stowage.json",
        ])
        .unwrap();

        assert_eq!(args.verbose, 2);
        assert_eq!(args.config, Some(PathBuf::from("stowage.json")));
        assert!(matches!(args.command, Commands::Install(_)));
    }
}
