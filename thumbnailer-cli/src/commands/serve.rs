//! Serve command - runs the HTTP thumbnail server.

use std::path::Path;
use std::time::Duration;

use clap::Args;
use tokio::net::TcpListener;
use tracing::info;

use crate::error::CliError;
use crate::runner::CliRunner;
use crate::server::{router, AppState};

/// Arguments for the serve command.
#[derive(Debug, Default, Args)]
pub struct ServeArgs {
    /// Port to listen on (overrides `[server] port`)
    #[arg(long)]
    pub port: Option<u16>,

    /// Address to bind (overrides `[server] bind`)
    #[arg(long)]
    pub bind: Option<String>,

    /// Keep thumbnails in memory only; nothing is written to disk
    #[arg(long)]
    pub no_persist: bool,
}

/// Run the serve command until SIGINT or SIGTERM.
pub async fn run(config_path: Option<&Path>, debug: bool, args: ServeArgs) -> Result<(), CliError> {
    let mut runner = CliRunner::new(config_path, debug)?;
    runner.log_startup("serve");

    if let Some(port) = args.port {
        runner.config_mut().server.port = port;
    }
    if let Some(bind) = args.bind {
        runner.config_mut().server.bind = bind;
    }

    let service = runner.start_service(!args.no_persist).await?;
    let server = &runner.config().server;

    let state = AppState::new(
        service.orchestrator().clone(),
        Duration::from_secs(server.max_age_secs),
    );
    let app = router(state);

    let addr = format!("{}:{}", server.bind, server.port);
    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|error| CliError::Bind {
            addr: addr.clone(),
            error,
        })?;

    info!(%addr, "Thumbnail server listening");
    println!("Thumbnail server listening on http://{}", addr);

    let result = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(CliError::Serve);

    service.shutdown().await;
    result
}

/// Resolves on Ctrl+C, or SIGTERM on unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
