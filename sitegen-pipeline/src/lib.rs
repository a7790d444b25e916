//! sitegen-pipeline: turns a site request into a deployed hosting preview.
//!
//! The pipeline stages a skeleton project into a private temp directory,
//! obtains a page plan (supplied or generated), then drives:
//! - `npm ci` → `npm run validate:plan` → `npm run build`
//! - `firebase hosting:channel:deploy <channel> --project <id> --json`
//!
//! and extracts the preview URL from whatever the deploy CLI printed.

pub mod build;
pub mod channel;
pub mod config;
pub mod deploy;
pub mod error;
pub mod pipeline;
pub mod plan;
pub mod request;
pub mod runner;
pub mod workspace;

pub use channel::ChannelId;
pub use config::{Environment, PipelineConfig};
pub use error::{PipelineError, Result};
pub use pipeline::PipelineController;
pub use request::{PreviewRequest, PreviewResponse};
pub use runner::{CommandOutput, CommandRunner, Invocation, Step, SystemRunner};

#[cfg(any(test, feature = "test-util"))]
pub use runner::ScriptedRunner;
