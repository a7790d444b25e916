//! sitegen-server: HTTP front end for the preview pipeline.
//!
//! Endpoints:
//! - `POST /generate_preview`: run the pipeline for a JSON request body
//! - `GET /healthz`, `GET /_health`: liveness. Some platforms intercept
//!   `/healthz`, so both paths answer.

pub mod config;
pub mod web;

pub use config::ServerConfig;
pub use web::{AppState, router};
