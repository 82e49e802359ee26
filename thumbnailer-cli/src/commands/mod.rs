//! CLI command implementations.
//!
//! Each subcommand has its own module with argument definitions and handlers.
//!
//! # Command Modules
//!
//! - [`cache`] - Thumbnail store management (clear, stats)
//! - [`config`] - Configuration management (init, path)
//! - [`render`] - One-shot render to a file
//! - [`serve`] - HTTP server (default command)

pub mod cache;
pub mod config;
pub mod render;
pub mod serve;
