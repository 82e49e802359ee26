//! Browser-driven thumbnail renderer.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures::future::try_join_all;
use tracing::{debug, warn};

use super::engine::{BrowserEngine, BrowserSession, PageMarker};
use super::{RenderOptions, Renderer};
use crate::key::RenderKey;
use crate::outcome::RenderError;

/// How often the page is checked for a render marker.
pub const MARKER_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Renders thumbnails by driving one page per request through a
/// [`BrowserEngine`].
///
/// Each page-level step (navigate, marker wait, asset barrier, capture) gets
/// its own `op_timeout`. A marker wait that runs out of time is reported as
/// [`RenderError::MarkerMissing`]; every other step reports
/// [`RenderError::Timeout`] naming the stage.
///
/// Opening a session is not bounded by `op_timeout`. Waiting for a free
/// session is queueing, not page work, and the engine owns any limit on
/// session creation.
pub struct ThumbnailRenderer<E> {
    engine: Arc<E>,
}

impl<E> Clone for ThumbnailRenderer<E> {
    fn clone(&self) -> Self {
        Self {
            engine: Arc::clone(&self.engine),
        }
    }
}

impl<E: BrowserEngine> ThumbnailRenderer<E> {
    pub fn new(engine: E) -> Self {
        Self {
            engine: Arc::new(engine),
        }
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    async fn drive(
        session: &E::Session,
        url: &str,
        op_timeout: Duration,
    ) -> Result<Vec<u8>, RenderError> {
        bounded("navigate", op_timeout, session.navigate(url)).await?;

        let marker = match tokio::time::timeout(op_timeout, wait_for_marker(session)).await {
            Ok(marker) => marker?,
            Err(_) => return Err(RenderError::MarkerMissing),
        };
        if marker == PageMarker::Failed {
            return Err(RenderError::UpstreamFailure);
        }

        bounded("asset barrier", op_timeout, asset_barrier(session)).await?;
        bounded("capture", op_timeout, session.capture_png()).await
    }
}

impl<E: BrowserEngine> Renderer for ThumbnailRenderer<E> {
    async fn render(
        &self,
        key: &RenderKey,
        options: &RenderOptions,
    ) -> Result<Vec<u8>, RenderError> {
        let url = options.page_url(key)?;
        let op_timeout = options.op_timeout;

        let session = self.engine.open_session(options.viewport).await?;

        debug!(key = %key, url = %url, "Rendering thumbnail");
        let result = Self::drive(&session, url.as_str(), op_timeout).await;

        if tokio::time::timeout(op_timeout, session.close()).await.is_err() {
            warn!(key = %key, "Browser session close timed out");
        }

        match &result {
            Ok(png) => debug!(key = %key, bytes = png.len(), "Thumbnail captured"),
            Err(e) => debug!(key = %key, error = %e, "Thumbnail render failed"),
        }
        result
    }
}

async fn bounded<T, F>(
    stage: &'static str,
    after: Duration,
    operation: F,
) -> Result<T, RenderError>
where
    F: Future<Output = Result<T, RenderError>>,
{
    tokio::time::timeout(after, operation)
        .await
        .map_err(|_| RenderError::Timeout { stage, after })?
}

async fn wait_for_marker<S: BrowserSession>(session: &S) -> Result<PageMarker, RenderError> {
    loop {
        if let Some(marker) = session.find_marker().await? {
            return Ok(marker);
        }
        tokio::time::sleep(MARKER_POLL_INTERVAL).await;
    }
}

/// Waits for fonts and every image; the first failure fails the barrier.
async fn asset_barrier<S: BrowserSession>(session: &S) -> Result<(), RenderError> {
    let probes = session.asset_probes().await?;
    let count = probes.len();
    try_join_all(probes.into_iter().map(|probe| session.probe_asset(probe))).await?;
    debug!(assets = count, "Assets ready");
    Ok(())
}
