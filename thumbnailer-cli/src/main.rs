//! Thumbnailer CLI - HTTP server and operator commands
//!
//! This binary serves report thumbnails over HTTP and exposes a few
//! maintenance commands for the thumbnail store and configuration.

mod commands;
mod error;
mod runner;
mod server;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use commands::cache::CacheAction;
use commands::config::ConfigCommands;
use commands::render::RenderArgs;
use commands::serve::ServeArgs;
use error::CliError;

#[derive(Parser)]
#[command(name = "thumbnailer")]
#[command(version = thumbnailer::VERSION)]
#[command(about = "Render and serve thumbnails of report pages", long_about = None)]
struct Cli {
    /// Configuration file (defaults to ~/.thumbnailer/config.ini)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug-level logging
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP thumbnail server (default)
    Serve(ServeArgs),

    /// Render a single code to a PNG file
    Render(RenderArgs),

    /// Manage the persistent thumbnail store
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },

    /// Manage the configuration file
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        e.exit();
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let config_path = cli.config.as_deref();

    match cli.command.unwrap_or_else(|| Commands::Serve(ServeArgs::default())) {
        Commands::Serve(args) => commands::serve::run(config_path, cli.debug, args).await,
        Commands::Render(args) => commands::render::run(config_path, cli.debug, args).await,
        Commands::Cache { action } => commands::cache::run(config_path, action),
        Commands::Config { command } => commands::config::run(config_path, command),
    }
}
