//! Settings structs for all configuration sections.
//!
//! Each struct represents one `[section]` of the INI config file.
//! These are pure data types with no parsing or serialization logic.

use std::path::PathBuf;

/// Complete application configuration loaded from config.ini.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    /// Upstream page source
    pub upstream: UpstreamSettings,
    /// Browser renderer settings
    pub renderer: RendererSettings,
    /// Persistent store and volatile cache settings
    pub cache: CacheSettings,
    /// HTTP server settings
    pub server: ServerSettings,
    /// Logging settings
    pub logging: LoggingSettings,
}

/// Where report pages are loaded from.
#[derive(Debug, Clone)]
pub struct UpstreamSettings {
    /// Base URL; the render key is appended as a path segment.
    pub base_url: String,
    /// Auxiliary service URL forwarded to the page, if any.
    pub aux_url: Option<String>,
}

/// Browser renderer configuration.
#[derive(Debug, Clone)]
pub struct RendererSettings {
    /// WebDriver (chromedriver) endpoint.
    pub webdriver_url: String,
    /// Deadline for each page-level operation, in milliseconds.
    pub timeout_ms: u64,
    pub viewport_width: u32,
    pub viewport_height: u32,
    /// Production mode launches `browser_binary` with `--no-sandbox`.
    pub production: bool,
    pub browser_binary: String,
    /// Maximum concurrent browser sessions.
    pub max_sessions: usize,
}

/// Cache configuration.
#[derive(Debug, Clone)]
pub struct CacheSettings {
    /// Directory holding persisted thumbnails.
    pub directory: PathBuf,
    /// Lifetime of volatile (in-memory) outcomes, in seconds.
    pub ttl_secs: u64,
    /// Interval of the expired-outcome sweeper, in seconds. 0 disables it.
    pub sweep_interval_secs: u64,
}

/// HTTP server configuration.
#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub bind: String,
    pub port: u16,
    /// Suffix stripped from request paths before rendering.
    pub strip_suffix: String,
    /// `max-age` advertised on successful responses, in seconds.
    pub max_age_secs: u64,
}

/// Logging configuration.
#[derive(Debug, Clone)]
pub struct LoggingSettings {
    /// Log file path
    pub file: PathBuf,
}
