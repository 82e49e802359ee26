//! Service error types.

use thiserror::Error;

use crate::outcome::RenderError;
use crate::store::StoreError;

/// Errors that can occur while starting the service.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Failed to create the browser engine
    #[error("Renderer error: {0}")]
    Renderer(#[from] RenderError),

    /// Failed to prepare the persistent store
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_prefixes() {
        let err = ServiceError::from(RenderError::Session("no driver".into()));
        assert_eq!(err.to_string(), "Renderer error: browser session error: no driver");

        let err = ServiceError::Config("bad".into());
        assert_eq!(err.to_string(), "Configuration error: bad");
    }
}
