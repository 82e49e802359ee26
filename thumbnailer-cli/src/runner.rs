//! CLI runner for common setup and operations.
//!
//! Encapsulates config loading, logging initialization and service startup
//! so command handlers stay small.

use std::path::{Path, PathBuf};

use thumbnailer::config::{config_file_path, ConfigFile};
use thumbnailer::logging::{init_logging, LoggingGuard};
use thumbnailer::service::ThumbnailService;
use thumbnailer::store::{MemoryStore, StoreBackend};
use tracing::info;

use crate::error::CliError;

/// Loads the config from `path`, or from the default location.
///
/// A missing file yields defaults.
pub fn load_config(path: Option<&Path>) -> Result<ConfigFile, CliError> {
    let path = resolve_config_path(path);
    Ok(ConfigFile::load_from(&path)?)
}

/// The config path in effect.
pub fn resolve_config_path(path: Option<&Path>) -> PathBuf {
    path.map(Path::to_path_buf).unwrap_or_else(config_file_path)
}

/// Runner that manages CLI lifecycle and common operations.
pub struct CliRunner {
    /// Logging guard - keeps logging active while runner exists
    _logging_guard: LoggingGuard,
    /// Loaded configuration file
    config: ConfigFile,
}

impl CliRunner {
    /// Loads configuration and initializes logging.
    ///
    /// # Arguments
    ///
    /// * `config_path` - Explicit config file, or `None` for the default
    /// * `debug_mode` - When true, enables debug-level logging regardless of RUST_LOG
    pub fn new(config_path: Option<&Path>, debug_mode: bool) -> Result<Self, CliError> {
        let config = load_config(config_path)?;

        let logging_guard = init_logging(&config.logging.file, debug_mode)
            .map_err(|e| CliError::LoggingInit(e.to_string()))?;

        Ok(Self {
            _logging_guard: logging_guard,
            config,
        })
    }

    pub fn config(&self) -> &ConfigFile {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut ConfigFile {
        &mut self.config
    }

    /// Log startup information for a command.
    pub fn log_startup(&self, command: &str) {
        info!("Thumbnailer v{}", thumbnailer::VERSION);
        info!("Thumbnailer CLI: {} command", command);
    }

    /// Starts the render service, optionally without persistence.
    pub async fn start_service(&self, persist: bool) -> Result<ThumbnailService, CliError> {
        let service = if persist {
            ThumbnailService::start(&self.config).await?
        } else {
            info!("Persistence disabled; thumbnails are kept in memory only");
            let store = StoreBackend::Memory(MemoryStore::new());
            ThumbnailService::start_with_store(&self.config, store).await?
        };
        Ok(service)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_config_from_explicit_path() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("custom.ini");
        std::fs::write(&path, "[server]\nport = 4000\n").unwrap();

        let config = load_config(Some(&path)).unwrap();

        assert_eq!(config.server.port, 4000);
    }

    #[test]
    fn test_load_config_invalid_value() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("bad.ini");
        std::fs::write(&path, "[renderer]\ntimeout_ms = soon\n").unwrap();

        assert!(matches!(load_config(Some(&path)), Err(CliError::Config(_))));
    }

    #[test]
    fn test_resolve_config_path_default() {
        assert_eq!(resolve_config_path(None), config_file_path());
    }
}
