//! Install, validate, build. Runs in that order and stops at the first failure.

use std::path::{Path, PathBuf};

use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use crate::plan::PagePlan;
use crate::runner::{CommandRunner, Invocation, Step};

/// Where the skeleton's validator and build read the plan from.
pub const PLAN_RELATIVE_PATH: &str = "content/page_plan.json";

/// Write the plan into `workspace` and run the skeleton's build steps.
///
/// Dependencies are installed before validation because the skeleton's
/// schema lives in its dependencies. Validation runs before the build so a
/// bad plan fails in seconds instead of after a full site build.
pub async fn prepare(
    workspace: &Path,
    plan: &PagePlan,
    runner: &dyn CommandRunner,
    config: &PipelineConfig,
) -> Result<()> {
    let plan_path = write_plan(workspace, plan).await?;
    tracing::info!(path = %plan_path.display(), "Wrote page plan");

    for invocation in build_steps(workspace, config) {
        tracing::info!(step = %invocation.step, command = %invocation.command_line(), "Running build step");
        runner.run(&invocation).await?.check(&invocation)?;
    }
    Ok(())
}

/// Write `plan` as pretty JSON to [`PLAN_RELATIVE_PATH`] under `workspace`.
pub async fn write_plan(workspace: &Path, plan: &PagePlan) -> Result<PathBuf> {
    let path = workspace.join(PLAN_RELATIVE_PATH);
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| PipelineError::io("failed to create content directory", parent, e))?;
    }
    tokio::fs::write(&path, plan.to_pretty_json()?)
        .await
        .map_err(|e| PipelineError::io("failed to write page plan", &path, e))?;
    Ok(path)
}

/// The build commands, in the order they must run.
pub fn build_steps(workspace: &Path, config: &PipelineConfig) -> [Invocation; 3] {
    let pm = config.package_manager.as_str();
    let t = &config.timeouts;
    [
        Invocation::new(Step::Install, pm, &["ci"], workspace).with_timeout(t.install),
        Invocation::new(Step::Validate, pm, &["run", "validate:plan"], workspace).with_timeout(t.validate),
        Invocation::new(Step::Build, pm, &["run", "build"], workspace).with_timeout(t.build),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::{CommandOutput, ScriptedRunner};
    use serde_json::json;
    use tempfile::TempDir;

    fn plan() -> PagePlan {
        PagePlan::new(json!({"meta": {"title": "Acme"}, "sections": []}))
    }

    #[tokio::test]
    async fn runs_install_validate_build_in_order() {
        let ws = TempDir::new().unwrap();
        let runner = ScriptedRunner::new();

        prepare(ws.path(), &plan(), &runner, &PipelineConfig::default()).await.unwrap();

        assert_eq!(runner.steps(), vec![Step::Install, Step::Validate, Step::Build]);
        let lines: Vec<String> = runner.calls().iter().map(Invocation::command_line).collect();
        assert_eq!(lines, vec!["npm ci", "npm run validate:plan", "npm run build"]);
        assert!(runner.calls().iter().all(|c| c.cwd == ws.path()));
    }

    #[tokio::test]
    async fn plan_is_written_before_any_step() {
        let ws = TempDir::new().unwrap();
        let runner = ScriptedRunner::new();

        prepare(ws.path(), &plan(), &runner, &PipelineConfig::default()).await.unwrap();

        let written = std::fs::read_to_string(ws.path().join(PLAN_RELATIVE_PATH)).unwrap();
        assert_eq!(written, plan().to_pretty_json().unwrap());
        assert!(written.contains("\n  \"meta\""));
    }

    #[tokio::test]
    async fn validation_failure_stops_before_build() {
        let ws = TempDir::new().unwrap();
        let runner = ScriptedRunner::new().with(
            Step::Validate,
            CommandOutput::failure(1, "", "page_plan.json failed schema validation"),
        );

        let err = prepare(ws.path(), &plan(), &runner, &PipelineConfig::default())
            .await
            .unwrap_err();

        assert!(matches!(err, PipelineError::CommandFailed { step: Step::Validate, code: Some(1), .. }));
        assert!(err.to_string().contains("failed schema validation"));
        assert_eq!(runner.steps(), vec![Step::Install, Step::Validate]);
    }

    #[tokio::test]
    async fn install_failure_stops_everything() {
        let ws = TempDir::new().unwrap();
        let runner = ScriptedRunner::new().with(Step::Install, CommandOutput::failure(1, "npm ERR! lockfile", ""));

        let err = prepare(ws.path(), &plan(), &runner, &PipelineConfig::default())
            .await
            .unwrap_err();

        assert!(matches!(err, PipelineError::CommandFailed { step: Step::Install, .. }));
        assert_eq!(runner.steps(), vec![Step::Install]);
    }

    #[tokio::test]
    async fn missing_package_manager_is_reported_as_such() {
        let ws = TempDir::new().unwrap();
        let runner = ScriptedRunner::new().without_tool("npm");

        let err = prepare(ws.path(), &plan(), &runner, &PipelineConfig::default())
            .await
            .unwrap_err();

        assert!(matches!(err, PipelineError::ToolNotFound(ref t) if t == "npm"));
        assert!(runner.calls().is_empty());
    }

    #[test]
    fn steps_use_configured_package_manager_and_timeouts() {
        let config = PipelineConfig {
            package_manager: "pnpm".to_string(),
            ..Default::default()
        };
        let steps = build_steps(Path::new("/ws"), &config);
        assert_eq!(steps[0].command_line(), "pnpm ci");
        assert_eq!(steps[1].timeout, config.timeouts.validate);
        assert_eq!(steps[2].timeout, config.timeouts.build);
    }
}
