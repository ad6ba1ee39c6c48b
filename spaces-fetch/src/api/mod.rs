//! REST API server module.
//!
//! HTTP endpoints for downloading and summarizing Spaces audio and for
//! inspecting background jobs.

pub mod error;
pub mod routes;
pub mod server;

pub use server::{ApiServer, ApiServerConfig, AppState};
