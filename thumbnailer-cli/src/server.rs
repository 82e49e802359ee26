//! HTTP front end for the render pipeline.
//!
//! Exposes a single route, `GET /:code`, which resolves the code through the
//! orchestrator and maps the outcome onto an HTTP response:
//!
//! | Outcome  | Status | Body        |
//! |----------|--------|-------------|
//! | success  | 200    | PNG bytes   |
//! | reserved | 404    | empty       |
//! | failure  | 400    | `error`     |

use std::time::Duration;

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::debug;

use thumbnailer::renderer::Renderer;
use thumbnailer::store::ArtifactStore;
use thumbnailer::{RenderOrchestrator, RenderOutcome};

/// Body sent with every failed render.
pub const ERROR_BODY: &str = "error";

/// Shared handler state.
pub struct AppState<R, S> {
    orchestrator: RenderOrchestrator<R, S>,
    cache_control: String,
}

impl<R, S> Clone for AppState<R, S> {
    fn clone(&self) -> Self {
        Self {
            orchestrator: self.orchestrator.clone(),
            cache_control: self.cache_control.clone(),
        }
    }
}

impl<R: Renderer, S: ArtifactStore> AppState<R, S> {
    /// `max_age` is advertised on successful responses.
    pub fn new(orchestrator: RenderOrchestrator<R, S>, max_age: Duration) -> Self {
        Self {
            orchestrator,
            cache_control: format!("public, max-age={}", max_age.as_secs()),
        }
    }
}

/// Builds the router with CORS and request tracing applied.
pub fn router<R: Renderer, S: ArtifactStore>(state: AppState<R, S>) -> Router {
    Router::new()
        .route("/:code", get(thumbnail::<R, S>))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn thumbnail<R: Renderer, S: ArtifactStore>(
    State(state): State<AppState<R, S>>,
    Path(code): Path<String>,
) -> Response {
    let outcome = state.orchestrator.resolve(&code).await;
    outcome_response(&outcome, &state.cache_control)
}

fn outcome_response(outcome: &RenderOutcome, cache_control: &str) -> Response {
    if outcome.is_reserved() {
        return StatusCode::NOT_FOUND.into_response();
    }

    match outcome {
        RenderOutcome::Success(data) => (
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, "image/png"),
                (header::CACHE_CONTROL, cache_control),
            ],
            data.to_vec(),
        )
            .into_response(),
        RenderOutcome::Failure(error) => {
            debug!(error = %error, "Responding with render failure");
            (StatusCode::BAD_REQUEST, ERROR_BODY).into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use thumbnailer::renderer::RenderOptions;
    use thumbnailer::store::MemoryStore;
    use thumbnailer::{RenderError, RenderKey};
    use tower::ServiceExt; // for `oneshot`

    #[derive(Clone, Default)]
    struct StubRenderer {
        calls: Arc<AtomicUsize>,
    }

    impl Renderer for StubRenderer {
        async fn render(
            &self,
            key: &RenderKey,
            _options: &RenderOptions,
        ) -> Result<Vec<u8>, RenderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if key.as_str().starts_with("bad") {
                return Err(RenderError::UpstreamFailure);
            }
            Ok(format!("png:{}", key.as_str()).into_bytes())
        }
    }

    fn test_app(renderer: StubRenderer) -> Router {
        let orchestrator = RenderOrchestrator::new(renderer, MemoryStore::new());
        router(AppState::new(orchestrator, Duration::from_secs(86400)))
    }

    fn get_request(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_success_returns_png() {
        let app = test_app(StubRenderer::default());

        let response = app.oneshot(get_request("/ABCD1234.png")).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "image/png");
        assert_eq!(
            response.headers()[header::CACHE_CONTROL],
            "public, max-age=86400"
        );
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"png:ABCD1234");
    }

    #[tokio::test]
    async fn test_failure_returns_400() {
        let app = test_app(StubRenderer::default());

        let response = app.oneshot(get_request("/bad-code")).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], ERROR_BODY.as_bytes());
    }

    #[tokio::test]
    async fn test_favicon_returns_404_without_render() {
        let renderer = StubRenderer::default();
        let app = test_app(renderer.clone());

        let response = app.oneshot(get_request("/favicon.ico")).await.unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(renderer.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_cors_header_present() {
        let app = test_app(StubRenderer::default());

        let request = Request::builder()
            .uri("/ABCD1234")
            .header(header::ORIGIN, "https://example.org")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert!(response
            .headers()
            .contains_key(header::ACCESS_CONTROL_ALLOW_ORIGIN));
    }

    #[tokio::test]
    async fn test_repeat_requests_render_once() {
        let renderer = StubRenderer::default();
        let app = test_app(renderer.clone());

        for uri in ["/K", "/K.png", "/K"] {
            let response = app.clone().oneshot(get_request(uri)).await.unwrap();
            assert_eq!(response.status(), StatusCode::OK);
        }

        assert_eq!(renderer.calls.load(Ordering::SeqCst), 1);
    }
}
