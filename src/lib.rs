//! # Cinetrack
//!
//! Resumable movie playback with per-viewer watch progress.
//!
//! This crate provides:
//! - A playback controller that mediates a video surface and tracks its state
//! - Debounced, threshold-filtered persistence of watch progress
//! - A local DuckDB catalog and watch history
//! - A headless surface and CLI for driving whole playback sessions

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod catalog;
pub mod config;
pub mod db;
pub mod display;
pub mod error;
pub mod player;
pub mod progress;
pub mod types;
pub mod watch;

pub use config::Config;
pub use db::Database;
pub use error::{Error, Result};
pub use watch::WatchPage;

/// Application version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = "cinetrack";
