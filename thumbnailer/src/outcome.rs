//! Render outcomes and the errors that produce failed ones.
//!
//! A [`RenderOutcome`] is immutable once produced. Both variants hold their
//! payload behind an `Arc`, so cloning an outcome (into the volatile cache,
//! across a broadcast channel, out to every coalesced waiter) shares the same
//! allocation rather than copying image bytes.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

/// Errors that can fail a render request.
///
/// Renderer-side kinds all collapse into a single `Failure` outcome at the
/// orchestrator boundary. Only [`RenderError::InvalidKey`] is distinguished
/// by the HTTP layer (404 instead of 400).
#[derive(Debug, Error)]
pub enum RenderError {
    /// Reserved or empty key; the renderer is never invoked.
    #[error("invalid key: {0:?}")]
    InvalidKey(String),

    /// A page-level operation exceeded its deadline.
    #[error("{stage} timed out after {after:?}")]
    Timeout {
        stage: &'static str,
        after: Duration,
    },

    /// Neither the ready marker nor the failed marker appeared.
    #[error("page exposed neither render marker")]
    MarkerMissing,

    /// The upstream page signalled its own loading error.
    #[error("upstream page reported a loading error")]
    UpstreamFailure,

    /// An image on the page failed to load or decode.
    #[error("asset failed to load: {0}")]
    AssetLoad(String),

    /// Navigation to the upstream page failed.
    #[error("navigation failed: {0}")]
    Navigation(String),

    /// The browser engine failed to open, drive, or capture a session.
    #[error("browser session error: {0}")]
    Session(String),

    /// Reading a persisted artifact failed.
    #[error("store I/O error: {0}")]
    StoreIo(String),

    /// The computation ended without producing a result.
    #[error("render task aborted")]
    Aborted,
}

impl RenderError {
    /// Returns true for the reserved/invalid key kind.
    pub fn is_reserved(&self) -> bool {
        matches!(self, Self::InvalidKey(_))
    }
}

/// Result of one render attempt.
#[derive(Debug, Clone)]
pub enum RenderOutcome {
    /// PNG bytes, shared between every holder of this outcome.
    Success(Arc<Vec<u8>>),
    /// The cause of the failure.
    Failure(Arc<RenderError>),
}

impl RenderOutcome {
    /// Wraps freshly rendered bytes.
    pub fn success(data: Vec<u8>) -> Self {
        Self::Success(Arc::new(data))
    }

    /// Wraps a failure cause.
    pub fn failure(error: RenderError) -> Self {
        Self::Failure(Arc::new(error))
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    /// Returns the image bytes for a successful outcome.
    pub fn data(&self) -> Option<&Arc<Vec<u8>>> {
        match self {
            Self::Success(data) => Some(data),
            Self::Failure(_) => None,
        }
    }

    /// Returns the failure cause for a failed outcome.
    pub fn error(&self) -> Option<&RenderError> {
        match self {
            Self::Success(_) => None,
            Self::Failure(e) => Some(e),
        }
    }

    /// True when the outcome is the fixed reserved-key failure.
    pub fn is_reserved(&self) -> bool {
        self.error().is_some_and(RenderError::is_reserved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clone_shares_bytes() {
        let outcome = RenderOutcome::success(vec![0x89, b'P', b'N', b'G']);
        let copy = outcome.clone();

        assert!(Arc::ptr_eq(outcome.data().unwrap(), copy.data().unwrap()));
    }

    #[test]
    fn test_reserved_only_for_invalid_key() {
        let reserved = RenderOutcome::failure(RenderError::InvalidKey("favicon.ico".into()));
        let upstream = RenderOutcome::failure(RenderError::UpstreamFailure);

        assert!(reserved.is_reserved());
        assert!(!upstream.is_reserved());
        assert!(!RenderOutcome::success(vec![1]).is_reserved());
    }

    #[test]
    fn test_timeout_display_names_stage() {
        let err = RenderError::Timeout {
            stage: "navigate",
            after: Duration::from_millis(5000),
        };
        assert!(err.to_string().contains("navigate"));
        assert!(err.to_string().contains("5s"));
    }
}
