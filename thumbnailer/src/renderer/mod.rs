//! Renderer client.
//!
//! The orchestrator only sees the [`Renderer`] trait: given a key, produce
//! PNG bytes or fail. The production implementation,
//! [`ThumbnailRenderer`], drives a headless browser through a
//! [`BrowserEngine`] in a fixed sequence:
//!
//! ```text
//! open session → navigate → wait for marker → asset barrier → capture
//!                                  │
//!                                  ├─ .thumbnail      → continue
//!                                  └─ .loading-error  → UpstreamFailure
//! ```
//!
//! The session is closed on every exit path before the render returns.

mod engine;
mod thumbnail;
mod webdriver;

pub use engine::{AssetProbe, BrowserEngine, BrowserSession, PageMarker};
pub use thumbnail::{ThumbnailRenderer, MARKER_POLL_INTERVAL};
pub use webdriver::{
    WebDriverConfig, WebDriverEngine, WebDriverSession, DEFAULT_BROWSER_BINARY,
    DEFAULT_MAX_SESSIONS, DEFAULT_WEBDRIVER_URL,
};

use std::future::Future;
use std::time::Duration;

use url::Url;

use crate::key::RenderKey;
use crate::outcome::RenderError;

/// Default upstream page source.
pub const DEFAULT_BASE_URL: &str = "https://spark.lucko.me";

/// Default per-operation deadline.
pub const DEFAULT_OP_TIMEOUT: Duration = Duration::from_millis(5000);

/// Query parameter that switches the upstream page into thumbnail mode.
pub const THUMBNAIL_QUERY_PARAM: &str = "x-render-thumbnail";

/// Query parameter carrying the auxiliary service URL.
pub const AUX_SERVICE_QUERY_PARAM: &str = "x-aux-service-url";

/// Browser window size used for captures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self::new(1200, 600)
    }
}

/// Options passed with every render.
#[derive(Debug, Clone)]
pub struct RenderOptions {
    /// Upstream content source; the key is appended as a path segment.
    pub base_url: String,
    /// Optional auxiliary service forwarded to the page as a query argument.
    pub aux_url: Option<String>,
    pub viewport: Viewport,
    /// Deadline applied to each page-level operation.
    pub op_timeout: Duration,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            aux_url: None,
            viewport: Viewport::default(),
            op_timeout: DEFAULT_OP_TIMEOUT,
        }
    }
}

impl RenderOptions {
    /// Builds the upstream page URL for `key`.
    ///
    /// The key is percent-encoded as a single path segment, so a key
    /// containing `/` or `?` cannot escape into another path or the query.
    pub fn page_url(&self, key: &RenderKey) -> Result<Url, RenderError> {
        let mut url = Url::parse(&self.base_url).map_err(|e| {
            RenderError::Navigation(format!("invalid base url {:?}: {}", self.base_url, e))
        })?;

        url.path_segments_mut()
            .map_err(|_| {
                RenderError::Navigation(format!("base url {:?} cannot take a path", self.base_url))
            })?
            .pop_if_empty()
            .push(key.as_str());

        {
            let mut query = url.query_pairs_mut();
            query.append_pair(THUMBNAIL_QUERY_PARAM, "true");
            if let Some(aux) = &self.aux_url {
                query.append_pair(AUX_SERVICE_QUERY_PARAM, aux);
            }
        }

        Ok(url)
    }
}

/// Produces PNG bytes for a key.
///
/// Implementations own their resource handling: whatever they allocate for
/// an attempt must be released before the returned future resolves,
/// including on failure and timeout.
pub trait Renderer: Send + Sync + 'static {
    fn render(
        &self,
        key: &RenderKey,
        options: &RenderOptions,
    ) -> impl Future<Output = Result<Vec<u8>, RenderError>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_url_default() {
        let options = RenderOptions::default();
        let url = options.page_url(&RenderKey::new("ABCD1234")).unwrap();

        assert_eq!(
            url.as_str(),
            "https://spark.lucko.me/ABCD1234?x-render-thumbnail=true"
        );
    }

    #[test]
    fn test_page_url_with_aux_service() {
        let options = RenderOptions {
            aux_url: Some("http://aux.local:8080".to_string()),
            ..Default::default()
        };
        let url = options.page_url(&RenderKey::new("k")).unwrap();

        let pairs: Vec<(String, String)> = url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        assert_eq!(
            pairs,
            vec![
                ("x-render-thumbnail".to_string(), "true".to_string()),
                ("x-aux-service-url".to_string(), "http://aux.local:8080".to_string()),
            ]
        );
    }

    #[test]
    fn test_page_url_encodes_key_as_one_segment() {
        let options = RenderOptions {
            base_url: "http://upstream.test/reports/".to_string(),
            ..Default::default()
        };
        let url = options.page_url(&RenderKey::new("a/b?c")).unwrap();

        assert_eq!(url.path(), "/reports/a%2Fb%3Fc");
        assert_eq!(url.query(), Some("x-render-thumbnail=true"));
    }

    #[test]
    fn test_page_url_rejects_bad_base() {
        let options = RenderOptions {
            base_url: "not a url".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            options.page_url(&RenderKey::new("k")),
            Err(RenderError::Navigation(_))
        ));
    }
}
