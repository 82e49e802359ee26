//! Conversions from configuration to pipeline components.

use std::time::Duration;

use crate::config::ConfigFile;
use crate::key::KeyPolicy;
use crate::renderer::{RenderOptions, Viewport, WebDriverConfig};

/// Render options from the `[upstream]` and `[renderer]` sections.
pub fn render_options(config: &ConfigFile) -> RenderOptions {
    RenderOptions {
        base_url: config.upstream.base_url.clone(),
        aux_url: config.upstream.aux_url.clone(),
        viewport: Viewport::new(
            config.renderer.viewport_width,
            config.renderer.viewport_height,
        ),
        op_timeout: Duration::from_millis(config.renderer.timeout_ms),
    }
}

/// WebDriver engine settings from the `[renderer]` section.
pub fn webdriver_config(config: &ConfigFile) -> WebDriverConfig {
    WebDriverConfig {
        webdriver_url: config.renderer.webdriver_url.clone(),
        production: config.renderer.production,
        browser_binary: config.renderer.browser_binary.clone(),
        max_sessions: config.renderer.max_sessions,
        ..WebDriverConfig::default()
    }
}

/// Key policy stripping the configured suffix.
pub fn key_policy(config: &ConfigFile) -> KeyPolicy {
    KeyPolicy::default().with_strip_suffixes([config.server.strip_suffix.clone()])
}

pub fn volatile_ttl(config: &ConfigFile) -> Duration {
    Duration::from_secs(config.cache.ttl_secs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_options_from_defaults() {
        let options = render_options(&ConfigFile::default());

        assert_eq!(options.base_url, "https://spark.lucko.me");
        assert_eq!(options.viewport, Viewport::new(1200, 600));
        assert_eq!(options.op_timeout, Duration::from_millis(5000));
        assert!(options.aux_url.is_none());
    }

    #[test]
    fn test_webdriver_config_production() {
        let mut config = ConfigFile::default();
        config.renderer.production = true;
        config.renderer.max_sessions = 2;

        let wd = webdriver_config(&config);

        assert!(wd.production);
        assert_eq!(wd.max_sessions, 2);
        assert_eq!(wd.browser_binary, "/usr/bin/chromium-browser");
    }

    #[test]
    fn test_key_policy_uses_configured_suffix() {
        let mut config = ConfigFile::default();
        config.server.strip_suffix = ".jpg".to_string();

        let policy = key_policy(&config);

        assert_eq!(policy.normalize("abc.jpg").unwrap().as_str(), "abc");
        assert_eq!(policy.normalize("abc.png").unwrap().as_str(), "abc.png");
        assert!(policy.normalize("favicon.ico").is_err());
    }

    #[test]
    fn test_empty_suffix_disables_stripping() {
        let mut config = ConfigFile::default();
        config.server.strip_suffix = String::new();

        assert_eq!(key_policy(&config).normalize("abc.png").unwrap().as_str(), "abc.png");
    }
}
