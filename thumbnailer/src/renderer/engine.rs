//! Browser engine abstraction.
//!
//! One long-lived [`BrowserEngine`] hands out short-lived
//! [`BrowserSession`]s, one per render attempt. Sessions are consumed by
//! [`BrowserSession::close`], so a session cannot be closed twice.

use std::future::Future;

use super::Viewport;
use crate::outcome::RenderError;

/// Which of the two mutually exclusive page markers is present.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageMarker {
    /// The page rendered its thumbnail (`.thumbnail`).
    Ready,
    /// The page reported a loading error (`.loading-error`).
    Failed,
}

impl PageMarker {
    pub const READY_SELECTOR: &'static str = ".thumbnail";
    pub const FAILED_SELECTOR: &'static str = ".loading-error";
}

/// One asset-readiness signal awaited before capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetProbe {
    /// All web fonts in the document are loaded.
    Fonts,
    /// The `<img>` element at this document-order index is decoded.
    Image(usize),
}

/// Long-lived browser capability shared by all renders.
pub trait BrowserEngine: Send + Sync + 'static {
    type Session: BrowserSession;

    /// Opens a fresh page sized to `viewport`.
    fn open_session(
        &self,
        viewport: Viewport,
    ) -> impl Future<Output = Result<Self::Session, RenderError>> + Send;
}

/// A single page, owned by one render attempt.
pub trait BrowserSession: Send + Sync {
    fn navigate(&self, url: &str) -> impl Future<Output = Result<(), RenderError>> + Send;

    /// Checks once for a render marker without waiting.
    fn find_marker(&self) -> impl Future<Output = Result<Option<PageMarker>, RenderError>> + Send;

    /// Lists the assets that must be ready before capture.
    fn asset_probes(&self) -> impl Future<Output = Result<Vec<AssetProbe>, RenderError>> + Send;

    /// Resolves once `probe` is ready; fails if the asset failed to load.
    fn probe_asset(
        &self,
        probe: AssetProbe,
    ) -> impl Future<Output = Result<(), RenderError>> + Send;

    fn capture_png(&self) -> impl Future<Output = Result<Vec<u8>, RenderError>> + Send;

    /// Releases the page. Errors are logged by the implementation.
    fn close(self) -> impl Future<Output = ()> + Send;
}
