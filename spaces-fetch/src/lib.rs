//! spaces-fetch library crate.
//!
//! Downloads Twitter Spaces audio through an external tool, caches it by
//! locator fingerprint, optionally summarizes it, and tracks background work
//! as jobs with a persistent log trail.

pub mod api;
pub mod cache;
pub mod config;
pub mod downloader;
pub mod error;
pub mod jobs;
pub mod logging;
pub mod pipeline;
pub mod queue;
pub mod summarize;
pub mod utils;

pub use error::{Error, Result};
