//! Pipeline error kinds.
//!
//! Every variant is terminal for the request. Messages carry the command line,
//! exit code and captured output so a failure can be diagnosed from the error
//! text alone.

use std::path::PathBuf;
use std::time::Duration;

use crate::runner::Step;

pub type Result<T, E = PipelineError> = std::result::Result<T, E>;

/// Why the page plan generator did not produce a plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeneratorFailure {
    /// The generator exited non-zero.
    ExitStatus,
    /// The generator exited cleanly but printed nothing.
    EmptyOutput,
    /// The generator printed something that is not JSON.
    InvalidOutput,
}

impl std::fmt::Display for GeneratorFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GeneratorFailure::ExitStatus => write!(f, "page plan generation failed"),
            GeneratorFailure::EmptyOutput => write!(f, "generator produced empty stdout"),
            GeneratorFailure::InvalidOutput => write!(f, "generator did not output valid JSON"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error(
        "firebaseProjectId is required (or set FIREBASE_PROJECT / GOOGLE_CLOUD_PROJECT in the environment)"
    )]
    MissingConfiguration,

    #[error("skeletonPath is not a directory: {}", .0.display())]
    InvalidSkeleton(PathBuf),

    #[error(
        "required command '{0}' was not found on PATH (the pipeline expects Node/npm and firebase-tools to be installed)"
    )]
    ToolNotFound(String),

    #[error("{step} failed ({}): {command}\n{output}", exit_code_label(.code))]
    CommandFailed {
        step: Step,
        command: String,
        code: Option<i32>,
        output: String,
    },

    #[error("{step} timed out after {timeout:?}: {command}")]
    CommandTimedOut {
        step: Step,
        command: String,
        timeout: Duration,
    },

    #[error("{failure}\n{detail}")]
    GeneratorFailed {
        failure: GeneratorFailure,
        detail: String,
    },

    #[error(
        "deploy to channel '{channel}' succeeded but preview URL could not be detected from firebase output\n{output}"
    )]
    DeployResultUnverifiable { channel: String, output: String },

    #[error("{context} ({}): {source}", .path.display())]
    Io {
        context: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to encode page plan: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl PipelineError {
    pub(crate) fn io(context: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        PipelineError::Io {
            context,
            path: path.into(),
            source,
        }
    }

    /// Whether the failure came from the caller's input rather than the
    /// pipeline or its tools.
    pub fn is_client_error(&self) -> bool {
        matches!(self, PipelineError::InvalidRequest(_))
    }
}

fn exit_code_label(code: &Option<i32>) -> String {
    match code {
        Some(c) => format!("exit code {c}"),
        None => "terminated by signal".to_string(),
    }
}

/// First `max_chars` characters of `text`, for embedding in error messages.
pub(crate) fn excerpt(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}
