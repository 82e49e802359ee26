//! Thumbnailer - server-side thumbnails for externally hosted report pages
//!
//! This library renders a report page in a headless browser, captures it as
//! a PNG, and caches the result so the expensive render happens at most once
//! per key.
//!
//! # Pipeline
//!
//! ```text
//! resolve(key) ─► persistent store ─► volatile cache ─► coalescer ─► renderer
//! ```
//!
//! - [`store`] holds permanent artifacts; presence proves a key was rendered
//! - [`cache`] remembers recent outcomes, failures included, for a TTL
//! - [`coalesce`] collapses concurrent requests for one key into one render
//! - [`orchestrator`] composes them behind [`RenderOrchestrator::resolve`]
//!
//! # High-Level API
//!
//! ```ignore
//! use thumbnailer::config::ConfigFile;
//! use thumbnailer::service::ThumbnailService;
//!
//! let config = ConfigFile::load()?;
//! let service = ThumbnailService::start(&config).await?;
//!
//! let outcome = service.orchestrator().resolve("ABCD1234.png").await;
//! ```

pub mod cache;
pub mod coalesce;
pub mod config;
pub mod key;
pub mod logging;
pub mod orchestrator;
pub mod outcome;
pub mod renderer;
pub mod service;
pub mod store;

pub use key::{KeyPolicy, RenderKey};
pub use orchestrator::RenderOrchestrator;
pub use outcome::{RenderError, RenderOutcome};

/// Version of the thumbnailer library and CLI.
///
/// This is synchronized across all components in the workspace.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
