//! INI serialization logic for converting `ConfigFile` → INI string.
//!
//! This module contains the `to_config_string()` function that produces
//! the commented INI representation written to `config.ini`.

use std::path::Path;

use super::settings::ConfigFile;

/// Convert a `ConfigFile` to a commented INI string for saving.
pub(super) fn to_config_string(config: &ConfigFile) -> String {
    let aux_url = config.upstream.aux_url.as_deref().unwrap_or("");
    let production = if config.renderer.production {
        "true"
    } else {
        "false"
    };

    format!(
        r#"[upstream]
; Base URL of the report pages. The render key is appended as a path segment
; and ?x-render-thumbnail=true is added to switch the page into thumbnail mode.
base_url = {}
; Optional auxiliary service URL, forwarded to the page as x-aux-service-url
aux_url = {}

[renderer]
; WebDriver endpoint of a running chromedriver
webdriver_url = {}
; Deadline for each page operation (navigate, wait, capture) in milliseconds
timeout_ms = {}
; Browser viewport in pixels
viewport_width = {}
viewport_height = {}
; Production mode launches browser_binary with --no-sandbox
production = {}
browser_binary = {}
; Maximum number of concurrent browser sessions
max_sessions = {}

[cache]
; Directory holding rendered thumbnails. Artifacts are permanent once written.
directory = {}
; How long render outcomes (including failures) are remembered in memory
ttl_secs = {}
; How often expired in-memory outcomes are swept (0 = only on lookup)
sweep_interval_secs = {}

[server]
bind = {}
port = {}
; Suffix stripped from request paths, so /abc and /abc.png are the same thumbnail
strip_suffix = {}
; Cache-Control max-age for served thumbnails, in seconds
max_age_secs = {}

[logging]
file = {}
"#,
        config.upstream.base_url,
        aux_url,
        config.renderer.webdriver_url,
        config.renderer.timeout_ms,
        config.renderer.viewport_width,
        config.renderer.viewport_height,
        production,
        config.renderer.browser_binary,
        config.renderer.max_sessions,
        path_to_string(&config.cache.directory),
        config.cache.ttl_secs,
        config.cache.sweep_interval_secs,
        config.server.bind,
        config.server.port,
        config.server.strip_suffix,
        config.server.max_age_secs,
        path_to_string(&config.logging.file),
    )
}

/// Writes paths under the home directory with a `~/` prefix.
fn path_to_string(path: &Path) -> String {
    if let Some(home) = dirs::home_dir() {
        if let Ok(stripped) = path.strip_prefix(&home) {
            return format!("~/{}", stripped.display());
        }
    }
    path.display().to_string()
}

#[cfg(test)]
mod tests {
    use super::super::settings::ConfigFile;
    use super::*;
    use std::path::PathBuf;
    use tempfile::TempDir;

    #[test]
    fn test_default_config_round_trips() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.ini");

        let mut config = ConfigFile::default();
        config.upstream.aux_url = Some("http://aux.local".to_string());
        config.renderer.production = true;
        config.cache.directory = PathBuf::from("/srv/thumbs");
        config.save_to(&path).unwrap();

        let loaded = ConfigFile::load_from(&path).unwrap();
        assert_eq!(loaded.upstream.aux_url.as_deref(), Some("http://aux.local"));
        assert!(loaded.renderer.production);
        assert_eq!(loaded.cache.directory, PathBuf::from("/srv/thumbs"));
        assert_eq!(loaded.server.strip_suffix, ".png");
        assert_eq!(loaded.logging.file, config.logging.file);
    }

    #[test]
    fn test_written_file_is_commented() {
        let content = to_config_string(&ConfigFile::default());

        assert!(content.contains("[renderer]"));
        assert!(content.contains("; WebDriver endpoint"));
        assert!(content.contains("timeout_ms = 5000"));
    }

    #[test]
    fn test_path_to_string_uses_tilde() {
        if let Some(home) = dirs::home_dir() {
            assert_eq!(path_to_string(&home.join("x/y")), "~/x/y");
        }
        assert_eq!(path_to_string(Path::new("/abs")), "/abs");
    }
}
