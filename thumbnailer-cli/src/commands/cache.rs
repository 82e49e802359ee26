//! Thumbnail store management CLI commands.

use std::path::Path;

use clap::Subcommand;
use thumbnailer::store::{clear_disk_store, disk_store_stats};

use crate::error::CliError;
use crate::runner::load_config;

/// Cache action subcommands.
#[derive(Debug, Subcommand)]
pub enum CacheAction {
    /// Delete every persisted thumbnail
    Clear,
    /// Show thumbnail store statistics
    Stats,
}

/// Run a cache subcommand.
pub fn run(config_path: Option<&Path>, action: CacheAction) -> Result<(), CliError> {
    let config = load_config(config_path)?;
    let store_dir = &config.cache.directory;

    match action {
        CacheAction::Clear => {
            println!("Clearing thumbnail store at: {}", store_dir.display());

            match clear_disk_store(store_dir) {
                Ok(result) => {
                    println!(
                        "Deleted {} files, freed {}",
                        result.files_deleted,
                        format_size(result.bytes_freed)
                    );
                    Ok(())
                }
                Err(e) => Err(CliError::CacheClear(e.to_string())),
            }
        }
        CacheAction::Stats => {
            println!("Thumbnail store: {}", store_dir.display());

            match disk_store_stats(store_dir) {
                Ok((files, bytes)) => {
                    println!("  Files: {}", files);
                    println!("  Size:  {}", format_size(bytes));
                    Ok(())
                }
                Err(e) => Err(CliError::CacheStats(e.to_string())),
            }
        }
    }
}

/// Format a size in bytes as a human-readable string.
fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = 1024 * KB;
    const GB: u64 = 1024 * MB;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} bytes", bytes)
    }
}
