//! Page plans: supplied by the caller or produced by the external generator.
//!
//! Generator contract:
//! - cwd: the generator location
//! - stdin: `{"intake": <request>}`
//! - stdout: the page plan as a single JSON document
//! - non-zero exit: failure, stderr and stdout both surfaced

use std::path::Path;

use serde::Serialize;
use serde_json::Value;

use crate::config::PipelineConfig;
use crate::error::{GeneratorFailure, PipelineError, Result, excerpt};
use crate::request::PreviewRequest;
use crate::runner::{CommandRunner, Invocation, Step};

/// How much raw generator output an `InvalidOutput` error keeps.
pub const INVALID_OUTPUT_EXCERPT_CHARS: usize = 2000;

/// The content/layout document the skeleton's build renders.
///
/// Opaque here: the skeleton's own validator decides whether it is well formed.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct PagePlan(Value);

impl PagePlan {
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    pub fn into_value(self) -> Value {
        self.0
    }

    /// Two-space indented JSON, keys in their original order.
    pub fn to_pretty_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.0)?)
    }
}

/// Where this request's plan came from, for logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanSource {
    Supplied,
    Generated,
}

/// Return the request's own plan if it has one, otherwise run the generator.
pub async fn obtain(
    request: &PreviewRequest,
    generator_dir: &Path,
    runner: &dyn CommandRunner,
    config: &PipelineConfig,
) -> Result<(PagePlan, PlanSource)> {
    if let Some(plan) = request.page_plan() {
        return Ok((PagePlan::new(plan.clone()), PlanSource::Supplied));
    }
    let plan = generate(request, generator_dir, runner, config).await?;
    Ok((plan, PlanSource::Generated))
}

/// Run the generator once and parse what it prints.
pub async fn generate(
    request: &PreviewRequest,
    generator_dir: &Path,
    runner: &dyn CommandRunner,
    config: &PipelineConfig,
) -> Result<PagePlan> {
    let intake = serde_json::to_string(&request.to_intake())?;
    let invocation = Invocation::new(
        Step::Generate,
        &config.generator_program,
        &[config.generator_script.as_str()],
        generator_dir,
    )
    .with_stdin(intake)
    .with_timeout(config.timeouts.generate);

    tracing::info!(
        generator = %generator_dir.display(),
        command = %invocation.command_line(),
        "Generating page plan"
    );
    let output = runner.run(&invocation).await?;

    if !output.is_success() {
        let mut detail = output.stderr.clone();
        if !output.stderr.is_empty() && !output.stdout.is_empty() {
            detail.push('\n');
        }
        detail.push_str(&output.stdout);
        return Err(PipelineError::GeneratorFailed {
            failure: GeneratorFailure::ExitStatus,
            detail,
        });
    }

    parse_generator_output(&output.stdout)
}

/// Interpret the generator's stdout as a page plan.
pub fn parse_generator_output(stdout: &str) -> Result<PagePlan> {
    let out = stdout.trim();
    if out.is_empty() {
        return Err(PipelineError::GeneratorFailed {
            failure: GeneratorFailure::EmptyOutput,
            detail: String::new(),
        });
    }
    serde_json::from_str(out)
        .map(PagePlan::new)
        .map_err(|e| PipelineError::GeneratorFailed {
            failure: GeneratorFailure::InvalidOutput,
            detail: format!("{e}\n\n{}", excerpt(out, INVALID_OUTPUT_EXCERPT_CHARS)),
        })
}
