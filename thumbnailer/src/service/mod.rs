//! High-level service facade.
//!
//! Wires configuration into a running render pipeline:
//!
//! ```text
//! ConfigFile ─► WebDriverEngine ─► ThumbnailRenderer ─┐
//!            ─► DiskStore (init) ─────────────────────┼─► RenderOrchestrator
//!            ─► VolatileCache (+ sweeper) ────────────┘
//! ```

mod builder;
mod error;
mod facade;

pub use builder::{key_policy, render_options, volatile_ttl, webdriver_config};
pub use error::ServiceError;
pub use facade::{ServiceOrchestrator, ThumbnailService};
