//! Upload command - validate a package archive and stage it for install.

use anyhow::Result;
use clap::Args;
use console::style;
use std::path::PathBuf;

use stowage_pm::{Config, UploadResponse};

use crate::{package_manager, print_response};

#[derive(Args, Debug)]
pub struct UploadArgs {
    /// Package archive (zip)
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    /// Type the package is expected to be (theme or extension)
    #[arg(short = 't', long = "type", value_name = "TYPE")]
    pub package_type: Option<String>,
}

pub fn execute(args: UploadArgs, config: Config) -> Result<i32> {
    let manager = package_manager(config)?;

    let response = manager.upload(Some(&args.file), args.package_type.as_deref());
    print_response(&response)?;

    match response {
        UploadResponse::Uploaded { package, install } => {
            eprintln!(
                "{} {} {} ready, install with {}",
                style("Uploaded").green().bold(),
                package.package_type,
                style(&package.name).white().bold(),
                style(format!("stowage install --path {}", install)).cyan()
            );
            Ok(0)
        }
        UploadResponse::Error { .. } => Ok(1),
    }
}
