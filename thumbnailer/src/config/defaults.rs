//! Default values and constants for all configuration settings.
//!
//! Contains all `DEFAULT_*` constants and the `ConfigFile::default()`
//! implementation.

use std::path::PathBuf;

use super::settings::*;

// =============================================================================
// Upstream
// =============================================================================

/// Default upstream page source.
pub const DEFAULT_UPSTREAM_BASE_URL: &str = crate::renderer::DEFAULT_BASE_URL;

// =============================================================================
// Renderer
// =============================================================================

/// Default WebDriver endpoint (chromedriver's default port).
pub const DEFAULT_WEBDRIVER_URL: &str = crate::renderer::DEFAULT_WEBDRIVER_URL;

/// Default per-operation render timeout (5 seconds).
pub const DEFAULT_RENDER_TIMEOUT_MS: u64 = 5000;

/// Default viewport width in pixels.
pub const DEFAULT_VIEWPORT_WIDTH: u32 = 1200;

/// Default viewport height in pixels.
pub const DEFAULT_VIEWPORT_HEIGHT: u32 = 600;

/// Browser binary launched in production mode.
pub const DEFAULT_BROWSER_BINARY: &str = crate::renderer::DEFAULT_BROWSER_BINARY;

/// Default maximum concurrent browser sessions.
pub const DEFAULT_MAX_SESSIONS: usize = crate::renderer::DEFAULT_MAX_SESSIONS;

// =============================================================================
// Cache
// =============================================================================

/// Default volatile cache TTL (5 minutes).
pub const DEFAULT_CACHE_TTL_SECS: u64 = 300;

/// Default sweep interval for expired volatile entries.
pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 60;

// =============================================================================
// Server
// =============================================================================

pub const DEFAULT_SERVER_BIND: &str = "0.0.0.0";

pub const DEFAULT_SERVER_PORT: u16 = 3000;

/// Suffix stripped from request paths.
pub const DEFAULT_STRIP_SUFFIX: &str = crate::key::DEFAULT_STRIP_SUFFIX;

/// `Cache-Control: max-age` for served thumbnails (1 day).
pub const DEFAULT_MAX_AGE_SECS: u64 = 86400;

// =============================================================================
// ConfigFile::default()
// =============================================================================

/// Default persistent store directory (`~/.cache/thumbnailer` on Linux).
pub fn default_cache_directory() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("thumbnailer")
}

impl Default for ConfigFile {
    fn default() -> Self {
        let config_dir = super::file::config_directory();

        Self {
            upstream: UpstreamSettings {
                base_url: DEFAULT_UPSTREAM_BASE_URL.to_string(),
                aux_url: None,
            },
            renderer: RendererSettings {
                webdriver_url: DEFAULT_WEBDRIVER_URL.to_string(),
                timeout_ms: DEFAULT_RENDER_TIMEOUT_MS,
                viewport_width: DEFAULT_VIEWPORT_WIDTH,
                viewport_height: DEFAULT_VIEWPORT_HEIGHT,
                production: false,
                browser_binary: DEFAULT_BROWSER_BINARY.to_string(),
                max_sessions: DEFAULT_MAX_SESSIONS,
            },
            cache: CacheSettings {
                directory: default_cache_directory(),
                ttl_secs: DEFAULT_CACHE_TTL_SECS,
                sweep_interval_secs: DEFAULT_SWEEP_INTERVAL_SECS,
            },
            server: ServerSettings {
                bind: DEFAULT_SERVER_BIND.to_string(),
                port: DEFAULT_SERVER_PORT,
                strip_suffix: DEFAULT_STRIP_SUFFIX.to_string(),
                max_age_secs: DEFAULT_MAX_AGE_SECS,
            },
            logging: LoggingSettings {
                file: config_dir.join("thumbnailer.log"),
            },
        }
    }
}
