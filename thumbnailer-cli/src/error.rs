//! CLI error handling with user-friendly messages.
//!
//! Centralizes error handling for the CLI, providing consistent formatting
//! and appropriate exit codes.

use std::fmt;
use std::process;
use thumbnailer::config::ConfigFileError;
use thumbnailer::service::ServiceError;
use thumbnailer::RenderError;

/// CLI-specific errors with user-friendly messages.
#[derive(Debug)]
pub enum CliError {
    /// Failed to initialize logging
    LoggingInit(String),
    /// Configuration error
    Config(String),
    /// Failed to start the service
    ServiceStart(ServiceError),
    /// Failed to bind the HTTP listener
    Bind { addr: String, error: std::io::Error },
    /// HTTP server error
    Serve(std::io::Error),
    /// A one-shot render failed
    Render { key: String, error: String },
    /// Failed to write output file
    FileWrite { path: String, error: std::io::Error },
    /// Failed to clear the thumbnail store
    CacheClear(String),
    /// Failed to read thumbnail store statistics
    CacheStats(String),
}

impl CliError {
    /// Exit the process with an appropriate error message and code.
    pub fn exit(&self) -> ! {
        eprintln!("Error: {}", self);

        match self {
            CliError::ServiceStart(ServiceError::Renderer(_)) | CliError::Render { .. } => {
                eprintln!();
                eprintln!("Common issues:");
                eprintln!(
                    "  1. chromedriver not running: start it with `chromedriver --port=9515`"
                );
                eprintln!("  2. renderer.webdriver_url in config.ini points elsewhere");
                eprintln!("  3. Upstream page unreachable or slower than renderer.timeout_ms");
            }
            CliError::Bind { .. } => {
                eprintln!();
                eprintln!("Another process may be using the port. Try --port <other>.");
            }
            _ => {}
        }

        process::exit(1)
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::LoggingInit(msg) => write!(f, "Failed to initialize logging: {}", msg),
            CliError::Config(msg) => write!(f, "Configuration error: {}", msg),
            CliError::ServiceStart(e) => write!(f, "Failed to start service: {}", e),
            CliError::Bind { addr, error } => write!(f, "Failed to bind {}: {}", addr, error),
            CliError::Serve(e) => write!(f, "HTTP server error: {}", e),
            CliError::Render { key, error } => write!(f, "Failed to render '{}': {}", key, error),
            CliError::FileWrite { path, error } => {
                write!(f, "Failed to write file '{}': {}", path, error)
            }
            CliError::CacheClear(msg) => write!(f, "Failed to clear thumbnail store: {}", msg),
            CliError::CacheStats(msg) => write!(f, "Failed to read thumbnail store: {}", msg),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::ServiceStart(e) => Some(e),
            CliError::Bind { error, .. } => Some(error),
            CliError::Serve(e) => Some(e),
            CliError::FileWrite { error, .. } => Some(error),
            _ => None,
        }
    }
}

impl From<ServiceError> for CliError {
    fn from(e: ServiceError) -> Self {
        CliError::ServiceStart(e)
    }
}

impl From<ConfigFileError> for CliError {
    fn from(e: ConfigFileError) -> Self {
        CliError::Config(e.to_string())
    }
}

impl CliError {
    /// Wraps the failure of a one-shot render.
    pub fn render(key: &str, error: &RenderError) -> Self {
        CliError::Render {
            key: key.to_string(),
            error: error.to_string(),
        }
    }
}
