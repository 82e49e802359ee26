//! W3C WebDriver browser engine.
//!
//! Talks to an external driver process (chromedriver) over HTTP. Each
//! render gets its own WebDriver session; a semaphore caps how many run at
//! once so a burst of distinct keys cannot spawn unbounded browser windows.
//!
//! Driver sessions live until they are deleted, so every session this engine
//! creates is deleted exactly once: on `close`, on drop, or by the creating
//! task when the caller has stopped waiting.
//!
//! # Endpoints used
//!
//! | Operation      | Request                                  |
//! |----------------|------------------------------------------|
//! | open session   | `POST   /session`                        |
//! | timeouts       | `POST   /session/{id}/timeouts`          |
//! | navigate       | `POST   /session/{id}/url`               |
//! | marker / probe | `POST   /session/{id}/execute/{sync,async}` |
//! | capture        | `GET    /session/{id}/screenshot`        |
//! | close          | `DELETE /session/{id}`                   |

use std::sync::Arc;
use std::time::Duration;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use reqwest::Method;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::runtime::Handle;
use tokio::sync::{oneshot, OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

use super::engine::{AssetProbe, BrowserEngine, BrowserSession, PageMarker};
use super::Viewport;
use crate::outcome::RenderError;

/// Default driver endpoint (chromedriver's default port).
pub const DEFAULT_WEBDRIVER_URL: &str = "http://127.0.0.1:9515";

/// Browser binary used in production mode.
pub const DEFAULT_BROWSER_BINARY: &str = "/usr/bin/chromium-browser";

/// Default cap on concurrent browser sessions.
pub const DEFAULT_MAX_SESSIONS: usize = 4;

/// Timeout for individual driver HTTP requests.
const DRIVER_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

const MARKER_SCRIPT: &str = r#"
if (document.querySelector(arguments[0])) return "ready";
if (document.querySelector(arguments[1])) return "failed";
return null;
"#;

const IMAGE_COUNT_SCRIPT: &str = r#"return document.querySelectorAll("img").length;"#;

const FONTS_SCRIPT: &str = r#"
const done = arguments[arguments.length - 1];
document.fonts.ready.then(() => done(null), (e) => done("fonts failed: " + e));
"#;

const IMAGE_SCRIPT: &str = r#"
const done = arguments[arguments.length - 1];
const img = document.querySelectorAll("img")[arguments[0]];
if (!img) { done(null); return; }
if (img.complete) {
  done(img.naturalHeight !== 0 ? null : "image failed to load: " + img.src);
  return;
}
img.addEventListener("load", () => done(null));
img.addEventListener("error", () => done("image failed to load: " + img.src));
"#;

/// Settings for [`WebDriverEngine`].
#[derive(Debug, Clone)]
pub struct WebDriverConfig {
    pub webdriver_url: String,
    /// Launch the packaged browser binary with `--no-sandbox`.
    pub production: bool,
    pub browser_binary: String,
    pub max_sessions: usize,
    /// Driver-side limit for asynchronous scripts (the asset probes).
    pub script_timeout: Duration,
}

impl Default for WebDriverConfig {
    fn default() -> Self {
        Self {
            webdriver_url: DEFAULT_WEBDRIVER_URL.to_string(),
            production: false,
            browser_binary: DEFAULT_BROWSER_BINARY.to_string(),
            max_sessions: DEFAULT_MAX_SESSIONS,
            script_timeout: Duration::from_secs(30),
        }
    }
}

impl WebDriverConfig {
    /// Builds the `capabilities` body for a new session.
    fn capabilities(&self, viewport: Viewport) -> Value {
        let mut args = vec![
            "--headless=new".to_string(),
            "--hide-scrollbars".to_string(),
            format!("--window-size={},{}", viewport.width, viewport.height),
        ];
        let mut chrome_options = json!({});

        if self.production {
            args.push("--no-sandbox".to_string());
            chrome_options["binary"] = json!(self.browser_binary);
        }
        chrome_options["args"] = json!(args);

        json!({
            "capabilities": {
                "alwaysMatch": {
                    "browserName": "chrome",
                    "goog:chromeOptions": chrome_options,
                }
            }
        })
    }
}

#[derive(Deserialize)]
struct WireResponse {
    #[serde(default)]
    value: Value,
}

#[derive(Deserialize, Default)]
struct WireError {
    #[serde(default)]
    error: String,
    #[serde(default)]
    message: String,
}

#[derive(Deserialize)]
struct NewSession {
    #[serde(rename = "sessionId")]
    session_id: String,
}

/// Thin JSON client for the driver's HTTP API.
#[derive(Clone)]
struct DriverClient {
    http: reqwest::Client,
    base_url: String,
}

impl DriverClient {
    async fn command(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<Value, String> {
        let url = format!("{}{}", self.base_url, path);
        trace!(method = %method, url = %url, "WebDriver command");

        let mut request = self.http.request(method, &url);
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request.send().await.map_err(|e| {
            warn!(
                url = %url,
                error = %e,
                is_connect = e.is_connect(),
                is_timeout = e.is_timeout(),
                "WebDriver request failed"
            );
            format!("request to {} failed: {}", url, e)
        })?;

        let status = response.status();
        let wire: WireResponse = response
            .json()
            .await
            .map_err(|e| format!("unreadable response from {} (HTTP {}): {}", url, status, e))?;

        if status.is_success() {
            Ok(wire.value)
        } else {
            let err: WireError = serde_json::from_value(wire.value).unwrap_or_default();
            Err(format!("HTTP {} {}: {}", status.as_u16(), err.error, err.message))
        }
    }
}

/// Browser engine backed by a WebDriver server.
pub struct WebDriverEngine {
    client: DriverClient,
    config: WebDriverConfig,
    sessions: Arc<Semaphore>,
}

impl WebDriverEngine {
    pub fn new(config: WebDriverConfig) -> Result<Self, RenderError> {
        let http = reqwest::Client::builder()
            .timeout(DRIVER_REQUEST_TIMEOUT)
            .tcp_nodelay(true)
            .build()
            .map_err(|e| {
                RenderError::Session(format!("Failed to create WebDriver client: {}", e))
            })?;

        let client = DriverClient {
            http,
            base_url: config.webdriver_url.trim_end_matches('/').to_string(),
        };
        let sessions = Arc::new(Semaphore::new(config.max_sessions.max(1)));

        Ok(Self {
            client,
            config,
            sessions,
        })
    }

    pub fn config(&self) -> &WebDriverConfig {
        &self.config
    }

    /// Number of sessions that can still be opened without waiting.
    pub fn available_sessions(&self) -> usize {
        self.sessions.available_permits()
    }

    /// Queries the driver's `/status` endpoint.
    ///
    /// Returns whether the driver reports itself ready for new sessions.
    pub async fn check_status(&self) -> Result<bool, RenderError> {
        let value = self
            .client
            .command(Method::GET, "/status", None)
            .await
            .map_err(RenderError::Session)?;
        Ok(value.get("ready").and_then(Value::as_bool).unwrap_or(false))
    }
}

impl BrowserEngine for WebDriverEngine {
    type Session = WebDriverSession;

    /// Waits for a pool slot, then creates a driver session.
    ///
    /// Session creation runs on its own task. If this future is dropped
    /// before the driver answers, the task deletes the session it created,
    /// so an abandoned open never leaves a browser running.
    async fn open_session(&self, viewport: Viewport) -> Result<WebDriverSession, RenderError> {
        let permit = Arc::clone(&self.sessions)
            .acquire_owned()
            .await
            .map_err(|_| RenderError::Session("session pool closed".into()))?;

        let (tx, rx) = oneshot::channel();
        let client = self.client.clone();
        let capabilities = self.config.capabilities(viewport);
        let script_ms = self.config.script_timeout.as_millis() as u64;

        tokio::spawn(async move {
            let result = create_session(client, capabilities, script_ms, permit).await;
            if let Err(Ok(session)) = tx.send(result) {
                warn!(session = %session.path, "Session opened after its render gave up");
                session.close().await;
            }
        });

        rx.await
            .map_err(|_| RenderError::Session("session task ended without a result".into()))?
    }
}

async fn create_session(
    client: DriverClient,
    capabilities: Value,
    script_ms: u64,
    permit: OwnedSemaphorePermit,
) -> Result<WebDriverSession, RenderError> {
    let value = client
        .command(Method::POST, "/session", Some(capabilities))
        .await
        .map_err(RenderError::Session)?;
    let created: NewSession = serde_json::from_value(value)
        .map_err(|e| RenderError::Session(format!("malformed new-session response: {}", e)))?;

    let session = WebDriverSession {
        client,
        path: format!("/session/{}", created.session_id),
        permit: Some(permit),
    };

    if let Err(e) = session
        .command(Method::POST, "/timeouts", Some(json!({ "script": script_ms })))
        .await
    {
        session.close().await;
        return Err(RenderError::Session(e));
    }

    debug!(session = %session.path, "WebDriver session opened");
    Ok(session)
}

/// Sends `DELETE /session/{id}`, then releases the pool slot.
async fn delete_session(client: DriverClient, path: String, permit: OwnedSemaphorePermit) {
    match client.command(Method::DELETE, &path, None).await {
        Ok(_) => debug!(session = %path, "WebDriver session closed"),
        Err(e) => warn!(session = %path, error = %e, "Failed to close WebDriver session"),
    }
    drop(permit);
}

/// One WebDriver session; holds a pool permit until closed.
///
/// The delete request runs on its own task, so a close that is timed out or
/// dropped still reaches the driver. A session dropped without `close` is
/// deleted the same way.
pub struct WebDriverSession {
    client: DriverClient,
    path: String,
    /// `None` once the delete has been dispatched.
    permit: Option<OwnedSemaphorePermit>,
}

impl WebDriverSession {
    async fn command(
        &self,
        method: Method,
        suffix: &str,
        body: Option<Value>,
    ) -> Result<Value, String> {
        self.client
            .command(method, &format!("{}{}", self.path, suffix), body)
            .await
    }

    fn dispatch_delete(&mut self) -> Option<JoinHandle<()>> {
        let permit = self.permit.take()?;
        let task = delete_session(self.client.clone(), self.path.clone(), permit);
        match Handle::try_current() {
            Ok(runtime) => Some(runtime.spawn(task)),
            Err(_) => {
                warn!(session = %self.path, "No runtime to close WebDriver session");
                None
            }
        }
    }

    async fn execute_sync(&self, script: &str, args: Value) -> Result<Value, RenderError> {
        self.command(
            Method::POST,
            "/execute/sync",
            Some(json!({ "script": script, "args": args })),
        )
        .await
        .map_err(RenderError::Session)
    }

    /// Runs an async probe script; `null` means ready, a string is the
    /// failure reason.
    async fn run_probe(&self, script: &str, args: Value) -> Result<(), RenderError> {
        let value = self
            .command(
                Method::POST,
                "/execute/async",
                Some(json!({ "script": script, "args": args })),
            )
            .await
            .map_err(RenderError::Session)?;

        match value {
            Value::Null => Ok(()),
            Value::String(reason) => Err(RenderError::AssetLoad(reason)),
            other => Err(RenderError::AssetLoad(other.to_string())),
        }
    }
}

impl Drop for WebDriverSession {
    fn drop(&mut self) {
        if self.dispatch_delete().is_some() {
            debug!(session = %self.path, "WebDriver session dropped without close");
        }
    }
}

impl BrowserSession for WebDriverSession {
    async fn navigate(&self, url: &str) -> Result<(), RenderError> {
        self.command(Method::POST, "/url", Some(json!({ "url": url })))
            .await
            .map(|_| ())
            .map_err(RenderError::Navigation)
    }

    async fn find_marker(&self) -> Result<Option<PageMarker>, RenderError> {
        let value = self
            .execute_sync(
                MARKER_SCRIPT,
                json!([PageMarker::READY_SELECTOR, PageMarker::FAILED_SELECTOR]),
            )
            .await?;

        Ok(match value.as_str() {
            Some("ready") => Some(PageMarker::Ready),
            Some("failed") => Some(PageMarker::Failed),
            _ => None,
        })
    }

    async fn asset_probes(&self) -> Result<Vec<AssetProbe>, RenderError> {
        let value = self.execute_sync(IMAGE_COUNT_SCRIPT, json!([])).await?;
        let images = value.as_u64().unwrap_or(0) as usize;

        let mut probes = Vec::with_capacity(images + 1);
        probes.push(AssetProbe::Fonts);
        probes.extend((0..images).map(AssetProbe::Image));
        Ok(probes)
    }

    async fn probe_asset(&self, probe: AssetProbe) -> Result<(), RenderError> {
        match probe {
            AssetProbe::Fonts => self.run_probe(FONTS_SCRIPT, json!([])).await,
            AssetProbe::Image(index) => self.run_probe(IMAGE_SCRIPT, json!([index])).await,
        }
    }

    async fn capture_png(&self) -> Result<Vec<u8>, RenderError> {
        let value = self
            .command(Method::GET, "/screenshot", None)
            .await
            .map_err(RenderError::Session)?;
        let encoded = value
            .as_str()
            .ok_or_else(|| RenderError::Session("screenshot response was not a string".into()))?;

        BASE64
            .decode(encoded)
            .map_err(|e| RenderError::Session(format!("screenshot was not valid base64: {}", e)))
    }

    async fn close(mut self) {
        if let Some(task) = self.dispatch_delete() {
            if let Err(e) = task.await {
                warn!(session = %self.path, error = %e, "WebDriver close task failed");
            }
        }
    }
}
