//! Render command - resolves one code and writes the PNG to a file.

use std::path::{Path, PathBuf};

use clap::Args;
use thumbnailer::RenderOutcome;
use tracing::info;

use crate::error::CliError;
use crate::runner::CliRunner;

/// Arguments for the render command.
#[derive(Debug, Args)]
pub struct RenderArgs {
    /// Report code to render (a trailing `.png` is stripped)
    pub code: String,

    /// Output PNG file
    #[arg(long, short)]
    pub output: PathBuf,

    /// Do not persist the result to the thumbnail store
    #[arg(long)]
    pub no_persist: bool,
}

/// Run the render command.
pub async fn run(
    config_path: Option<&Path>,
    debug: bool,
    args: RenderArgs,
) -> Result<(), CliError> {
    let runner = CliRunner::new(config_path, debug)?;
    runner.log_startup("render");

    let service = runner.start_service(!args.no_persist).await?;
    let outcome = service.orchestrator().resolve(&args.code).await;
    service.shutdown().await;

    match outcome {
        RenderOutcome::Failure(error) => Err(CliError::render(&args.code, &error)),
        RenderOutcome::Success(data) => {
            tokio::fs::write(&args.output, data.as_slice())
                .await
                .map_err(|error| CliError::FileWrite {
                    path: args.output.display().to_string(),
                    error,
                })?;

            info!(code = %args.code, bytes = data.len(), "Thumbnail written");
            println!(
                "Wrote {} ({} bytes)",
                args.output.display(),
                data.len()
            );
            Ok(())
        }
    }
}
