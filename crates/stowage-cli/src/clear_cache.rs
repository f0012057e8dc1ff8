//! Clear-cache command - wipe the application cache directory.

use anyhow::{Context, Result};
use clap::Args;
use console::style;

use stowage_pm::{CacheDir, Config};

#[derive(Args, Debug)]
pub struct ClearCacheArgs {
    /// Only report the cache size, remove nothing
    #[arg(long)]
    pub dry_run: bool,
}

pub fn execute(args: ClearCacheArgs, config: Config) -> Result<i32> {
    let cache = CacheDir::new(&config.cache_dir);

    if !cache.root().exists() {
        println!("{} Cache directory does not exist: {}",
            style("Info:").cyan(),
            cache.root().display()
        );
        return Ok(0);
    }

    if args.dry_run {
        let size = cache.size().context("Failed to calculate cache size")?;
        println!("{} Cache at {} holds {}",
            style("Info:").cyan(),
            cache.root().display(),
            format_bytes(size)
        );
        return Ok(0);
    }

    println!("{} Clearing cache at {}...",
        style("Info:").cyan(),
        cache.root().display()
    );

    let freed = cache.clear_contents().context("Failed to clear cache")?;

    println!("{} Cache cleared, freed {}",
        style("Success:").green().bold(),
        format_bytes(freed)
    );

    Ok(0)
}

/// Format bytes as human-readable string
fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;

    if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} bytes", bytes)
    }
}
