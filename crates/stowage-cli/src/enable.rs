//! Enable command - turn an installed extension back on.
//!
//! Updating an active extension disables it first; this is the way back.

use anyhow::{Context, Result};
use clap::Args;
use console::style;

use stowage_pm::installer::{DirectoryInstaller, DirectoryRegistry, ExtensionHandle};
use stowage_pm::Config;

#[derive(Args, Debug)]
pub struct EnableArgs {
    /// Name of the installed extension
    #[arg(value_name = "NAME")]
    pub name: String,
}

pub fn execute(args: EnableArgs, config: Config) -> Result<i32> {
    let extensions = DirectoryInstaller::extensions(&config.packages_dir);
    let registry = DirectoryRegistry::new(extensions.root());

    let Some(extension) = registry.extension(&args.name) else {
        eprintln!("{} Extension {} is not installed",
            style("Error:").red().bold(),
            style(&args.name).white().bold()
        );
        return Ok(1);
    };

    if extension.is_enabled() {
        println!("{} {} is already enabled", style("Info:").cyan(), args.name);
        return Ok(0);
    }

    extension
        .enable()
        .with_context(|| format!("Failed to enable {}", args.name))?;

    println!("{} {} enabled",
        style("Success:").green().bold(),
        style(&args.name).white().bold()
    );

    Ok(0)
}
