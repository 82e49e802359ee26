//! Render key normalization.
//!
//! Keys arrive as untrusted path segments. Normalization strips a recognized
//! file-extension suffix so `abc` and `abc.png` share one cache and storage
//! entry, and rejects reserved keys before any work is done. No other
//! validation happens: the key is handed to the renderer as-is.

use std::fmt;
use std::sync::Arc;

use sha2::{Digest, Sha256};

use crate::outcome::RenderError;

/// Suffix stripped from incoming keys by default.
pub const DEFAULT_STRIP_SUFFIX: &str = ".png";

/// Key browsers request on their own; never rendered.
pub const FAVICON_KEY: &str = "favicon.ico";

/// A normalized, opaque render key.
///
/// Cheap to clone; used as the key of the coalescer table, the volatile
/// cache, and (hashed) the persistent store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RenderKey(Arc<str>);

impl RenderKey {
    /// Wraps an already-normalized key.
    pub fn new(key: impl AsRef<str>) -> Self {
        Self(Arc::from(key.as_ref()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Hex SHA-256 digest of the key, stable across processes.
    ///
    /// Used to name stored artifacts so arbitrary key text never becomes
    /// part of a filesystem path.
    pub fn digest(&self) -> String {
        hex::encode(Sha256::digest(self.0.as_bytes()))
    }
}

impl fmt::Display for RenderKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Rules for turning a raw path segment into a [`RenderKey`].
#[derive(Debug, Clone)]
pub struct KeyPolicy {
    strip_suffixes: Vec<String>,
    reserved: Vec<String>,
}

impl KeyPolicy {
    pub fn new() -> Self {
        Self {
            strip_suffixes: vec![DEFAULT_STRIP_SUFFIX.to_string()],
            reserved: vec![FAVICON_KEY.to_string()],
        }
    }

    /// Replaces the stripped suffixes. An empty string is ignored.
    pub fn with_strip_suffixes<I, S>(mut self, suffixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.strip_suffixes = suffixes
            .into_iter()
            .map(Into::into)
            .filter(|s: &String| !s.is_empty())
            .collect();
        self
    }

    /// Adds a reserved key.
    pub fn with_reserved(mut self, key: impl Into<String>) -> Self {
        self.reserved.push(key.into());
        self
    }

    /// Normalizes a raw key.
    ///
    /// Never suspends. Fails with [`RenderError::InvalidKey`] for reserved
    /// keys and for keys that are empty once the suffix is removed.
    pub fn normalize(&self, raw: &str) -> Result<RenderKey, RenderError> {
        if self.is_reserved(raw) {
            return Err(RenderError::InvalidKey(raw.to_string()));
        }

        let stripped = self
            .strip_suffixes
            .iter()
            .find_map(|suffix| raw.strip_suffix(suffix.as_str()))
            .unwrap_or(raw);

        if stripped.is_empty() || self.is_reserved(stripped) {
            return Err(RenderError::InvalidKey(raw.to_string()));
        }

        Ok(RenderKey::new(stripped))
    }

    fn is_reserved(&self, key: &str) -> bool {
        self.reserved.iter().any(|r| r == key)
    }
}

impl Default for KeyPolicy {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_suffix_and_bare_key_normalize_identically() {
        let policy = KeyPolicy::new();

        let bare = policy.normalize("abc").unwrap();
        let suffixed = policy.normalize("abc.png").unwrap();

        assert_eq!(bare, suffixed);
        assert_eq!(bare.digest(), suffixed.digest());
    }

    #[test]
    fn test_suffix_stripped_once() {
        let policy = KeyPolicy::new();
        assert_eq!(policy.normalize("abc.png.png").unwrap().as_str(), "abc.png");
    }

    #[test]
    fn test_favicon_is_reserved() {
        let policy = KeyPolicy::new();
        let err = policy.normalize("favicon.ico").unwrap_err();
        assert!(err.is_reserved());
    }

    #[test]
    fn test_bare_suffix_is_invalid() {
        let policy = KeyPolicy::new();
        assert!(policy.normalize(".png").unwrap_err().is_reserved());
        assert!(policy.normalize("").unwrap_err().is_reserved());
    }

    #[test]
    fn test_untrusted_text_passes_through() {
        let policy = KeyPolicy::new();
        let key = policy.normalize("../etc/passwd?x=1").unwrap();

        assert_eq!(key.as_str(), "../etc/passwd?x=1");
        assert!(!key.digest().contains('/'));
        assert_eq!(key.digest().len(), 64);
    }

    #[test]
    fn test_custom_suffixes() {
        let policy = KeyPolicy::new().with_strip_suffixes([".jpg", ""]);

        assert_eq!(policy.normalize("abc.jpg").unwrap().as_str(), "abc");
        assert_eq!(policy.normalize("abc.png").unwrap().as_str(), "abc.png");
    }

    #[test]
    fn test_digest_is_deterministic() {
        assert_eq!(RenderKey::new("same").digest(), RenderKey::new("same").digest());
        assert_ne!(RenderKey::new("same").digest(), RenderKey::new("other").digest());
    }
}
