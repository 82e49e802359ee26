//! Running thumbnail service.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::builder::{key_policy, render_options, volatile_ttl, webdriver_config};
use super::error::ServiceError;
use crate::cache::VolatileCache;
use crate::config::ConfigFile;
use crate::orchestrator::RenderOrchestrator;
use crate::renderer::{ThumbnailRenderer, WebDriverEngine};
use crate::store::{ArtifactStore, DiskStore, StoreBackend};

/// The orchestrator type used by the production service.
pub type ServiceOrchestrator = RenderOrchestrator<ThumbnailRenderer<WebDriverEngine>, StoreBackend>;

/// A started render pipeline plus its background tasks.
pub struct ThumbnailService {
    orchestrator: ServiceOrchestrator,
    shutdown: CancellationToken,
    sweeper: Option<JoinHandle<()>>,
}

impl ThumbnailService {
    /// Starts the service with the on-disk store from `[cache] directory`.
    pub async fn start(config: &ConfigFile) -> Result<Self, ServiceError> {
        let store = StoreBackend::Disk(DiskStore::new(config.cache.directory.clone()));
        Self::start_with_store(config, store).await
    }

    /// Starts the service over an explicit store.
    pub async fn start_with_store(
        config: &ConfigFile,
        store: StoreBackend,
    ) -> Result<Self, ServiceError> {
        if config.renderer.timeout_ms == 0 {
            return Err(ServiceError::Config(
                "renderer.timeout_ms must be greater than zero".to_string(),
            ));
        }

        let engine = WebDriverEngine::new(webdriver_config(config))?;
        match engine.check_status().await {
            Ok(true) => info!(url = %config.renderer.webdriver_url, "WebDriver ready"),
            Ok(false) => warn!(url = %config.renderer.webdriver_url, "WebDriver reports not ready"),
            Err(e) => warn!(
                url = %config.renderer.webdriver_url,
                error = %e,
                "WebDriver unreachable; renders will fail until it is available"
            ),
        }

        store.init().await?;

        let volatile = Arc::new(VolatileCache::new(volatile_ttl(config)));
        let shutdown = CancellationToken::new();
        let sweeper = match config.cache.sweep_interval_secs {
            0 => None,
            secs => Some(volatile.spawn_sweeper(Duration::from_secs(secs), shutdown.clone())),
        };

        let orchestrator = RenderOrchestrator::builder(ThumbnailRenderer::new(engine), store)
            .options(render_options(config))
            .key_policy(key_policy(config))
            .volatile_cache(volatile)
            .build();

        info!(
            upstream = %config.upstream.base_url,
            ttl_secs = config.cache.ttl_secs,
            timeout_ms = config.renderer.timeout_ms,
            "Thumbnail service started"
        );

        Ok(Self {
            orchestrator,
            shutdown,
            sweeper,
        })
    }

    pub fn orchestrator(&self) -> &ServiceOrchestrator {
        &self.orchestrator
    }

    /// Stops background tasks and logs final statistics.
    pub async fn shutdown(mut self) {
        self.shutdown.cancel();
        if let Some(sweeper) = self.sweeper.take() {
            if let Err(e) = sweeper.await {
                warn!(error = %e, "Volatile cache sweeper did not stop cleanly");
            }
        }
        self.orchestrator.log_stats();
        info!("Thumbnail service stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use tempfile::TempDir;

    fn offline_config() -> ConfigFile {
        let mut config = ConfigFile::default();
        // Nothing listens on the discard port.
        config.renderer.webdriver_url = "http://127.0.0.1:9".to_string();
        config
    }

    #[tokio::test]
    async fn test_start_creates_store_directory() {
        let temp_dir = TempDir::new().unwrap();
        let mut config = offline_config();
        config.cache.directory = temp_dir.path().join("thumbs");

        let service = ThumbnailService::start(&config).await.unwrap();

        assert!(config.cache.directory.is_dir());
        service.shutdown().await;
    }

    #[tokio::test]
    async fn test_reserved_key_needs_no_driver() {
        let config = offline_config();
        let service =
            ThumbnailService::start_with_store(&config, StoreBackend::Memory(MemoryStore::new()))
                .await
                .unwrap();

        let outcome = service.orchestrator().resolve("favicon.ico").await;

        assert!(outcome.is_reserved());
        service.shutdown().await;
    }

    #[tokio::test]
    async fn test_unreachable_driver_yields_failure() {
        let config = offline_config();
        let service =
            ThumbnailService::start_with_store(&config, StoreBackend::Memory(MemoryStore::new()))
                .await
                .unwrap();

        let outcome = service.orchestrator().resolve("ABCD1234").await;

        assert!(!outcome.is_success());
        assert_eq!(service.orchestrator().stats().render_failures, 1);
        service.shutdown().await;
    }

    #[tokio::test]
    async fn test_sweeper_disabled_with_zero_interval() {
        let mut config = offline_config();
        config.cache.sweep_interval_secs = 0;

        let service =
            ThumbnailService::start_with_store(&config, StoreBackend::Memory(MemoryStore::new()))
                .await
                .unwrap();

        assert!(service.sweeper.is_none());
        service.shutdown().await;
    }
}
