//! INI parsing logic for converting `Ini` → `ConfigFile`.
//!
//! This module contains the `parse_ini()` function and its helpers.
//! It is the single place where INI key names are mapped to struct fields.

use std::path::PathBuf;
use std::str::FromStr;

use ini::Ini;
use url::Url;

use super::file::ConfigFileError;
use super::settings::ConfigFile;

/// Parse an `Ini` object into a `ConfigFile`.
///
/// Starts from `ConfigFile::default()` and overlays any values found in the INI.
pub(super) fn parse_ini(ini: &Ini) -> Result<ConfigFile, ConfigFileError> {
    let mut config = ConfigFile::default();

    // [upstream] section
    if let Some(section) = ini.section(Some("upstream")) {
        if let Some(v) = section.get("base_url") {
            config.upstream.base_url = parse_url("upstream", "base_url", v)?;
        }
        if let Some(v) = section.get("aux_url") {
            let v = v.trim();
            if !v.is_empty() {
                config.upstream.aux_url = Some(v.to_string());
            }
        }
    }

    // [renderer] section
    if let Some(section) = ini.section(Some("renderer")) {
        if let Some(v) = section.get("webdriver_url") {
            config.renderer.webdriver_url = parse_url("renderer", "webdriver_url", v)?;
        }
        if let Some(v) = section.get("timeout_ms") {
            config.renderer.timeout_ms = parse_positive(
                "renderer",
                "timeout_ms",
                v,
                "must be a positive integer (milliseconds)",
            )?;
        }
        if let Some(v) = section.get("viewport_width") {
            config.renderer.viewport_width = parse_positive(
                "renderer",
                "viewport_width",
                v,
                "must be a positive integer (pixels)",
            )?;
        }
        if let Some(v) = section.get("viewport_height") {
            config.renderer.viewport_height = parse_positive(
                "renderer",
                "viewport_height",
                v,
                "must be a positive integer (pixels)",
            )?;
        }
        if let Some(v) = section.get("production") {
            config.renderer.production = parse_bool(v);
        }
        if let Some(v) = section.get("browser_binary") {
            let v = v.trim();
            if !v.is_empty() {
                config.renderer.browser_binary = v.to_string();
            }
        }
        if let Some(v) = section.get("max_sessions") {
            config.renderer.max_sessions =
                parse_positive("renderer", "max_sessions", v, "must be a positive integer")?;
        }
    }

    // [cache] section
    if let Some(section) = ini.section(Some("cache")) {
        if let Some(v) = section.get("directory") {
            let v = v.trim();
            if !v.is_empty() {
                config.cache.directory = expand_tilde(v);
            }
        }
        if let Some(v) = section.get("ttl_secs") {
            config.cache.ttl_secs = v.trim().parse().map_err(|_| ConfigFileError::InvalidValue {
                section: "cache".to_string(),
                key: "ttl_secs".to_string(),
                value: v.to_string(),
                reason: "must be a non-negative integer (seconds)".to_string(),
            })?;
        }
        if let Some(v) = section.get("sweep_interval_secs") {
            config.cache.sweep_interval_secs =
                v.trim().parse().map_err(|_| ConfigFileError::InvalidValue {
                    section: "cache".to_string(),
                    key: "sweep_interval_secs".to_string(),
                    value: v.to_string(),
                    reason: "must be a non-negative integer (seconds, 0 disables)".to_string(),
                })?;
        }
    }

    // [server] section
    if let Some(section) = ini.section(Some("server")) {
        if let Some(v) = section.get("bind") {
            let v = v.trim();
            if v.parse::<std::net::IpAddr>().is_err() {
                return Err(ConfigFileError::InvalidValue {
                    section: "server".to_string(),
                    key: "bind".to_string(),
                    value: v.to_string(),
                    reason: "must be an IP address".to_string(),
                });
            }
            config.server.bind = v.to_string();
        }
        if let Some(v) = section.get("port") {
            config.server.port =
                parse_positive("server", "port", v, "must be a port number (1-65535)")?;
        }
        if let Some(v) = section.get("strip_suffix") {
            config.server.strip_suffix = v.trim().to_string();
        }
        if let Some(v) = section.get("max_age_secs") {
            config.server.max_age_secs =
                v.trim()
                    .parse()
                    .map_err(|_| ConfigFileError::InvalidValue {
                        section: "server".to_string(),
                        key: "max_age_secs".to_string(),
                        value: v.to_string(),
                        reason: "must be a non-negative integer (seconds)".to_string(),
                    })?;
        }
    }

    // [logging] section
    if let Some(section) = ini.section(Some("logging")) {
        if let Some(v) = section.get("file") {
            let v = v.trim();
            if !v.is_empty() {
                config.logging.file = expand_tilde(v);
            }
        }
    }

    Ok(config)
}

/// Parses a non-zero integer value.
fn parse_positive<T>(
    section: &str,
    key: &str,
    value: &str,
    reason: &str,
) -> Result<T, ConfigFileError>
where
    T: FromStr + PartialEq + Default,
{
    match value.trim().parse::<T>() {
        Ok(parsed) if parsed != T::default() => Ok(parsed),
        _ => Err(ConfigFileError::InvalidValue {
            section: section.to_string(),
            key: key.to_string(),
            value: value.to_string(),
            reason: reason.to_string(),
        }),
    }
}

/// Validates an absolute http(s) URL, returned without a trailing slash.
fn parse_url(section: &str, key: &str, value: &str) -> Result<String, ConfigFileError> {
    let value = value.trim();
    match Url::parse(value) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => {
            Ok(value.trim_end_matches('/').to_string())
        }
        _ => Err(ConfigFileError::InvalidValue {
            section: section.to_string(),
            key: key.to_string(),
            value: value.to_string(),
            reason: "must be an http:// or https:// URL".to_string(),
        }),
    }
}

pub(super) fn parse_bool(value: &str) -> bool {
    let v = value.trim().to_lowercase();
    v == "true" || v == "1" || v == "yes" || v == "on"
}

/// Expand ~ to home directory in paths.
pub(super) fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}
