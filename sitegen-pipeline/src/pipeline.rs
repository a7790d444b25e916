//! End-to-end flow for one preview request.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use chrono::{NaiveDate, Utc};

use crate::channel::ChannelId;
use crate::config::{self, Environment, PipelineConfig};
use crate::error::{PipelineError, Result};
use crate::request::{PreviewRequest, PreviewResponse};
use crate::runner::{CommandRunner, SystemRunner};
use crate::workspace::StagedWorkspace;
use crate::{build, deploy, plan};

type Clock = Arc<dyn Fn() -> NaiveDate + Send + Sync>;

/// Runs the stage → plan → build → deploy sequence for requests.
///
/// Holds only read-only state, so one controller can serve concurrent
/// requests; each run gets its own temp workspace.
#[derive(Clone)]
pub struct PipelineController {
    config: PipelineConfig,
    env: Environment,
    runner: Arc<dyn CommandRunner>,
    today: Clock,
}

impl std::fmt::Debug for PipelineController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineController")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl PipelineController {
    pub fn new(config: PipelineConfig, env: Environment, runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            config,
            env,
            runner,
            today: Arc::new(|| Utc::now().date_naive()),
        }
    }

    /// Real processes, default tools, current process environment.
    pub fn from_env() -> Self {
        Self::new(
            PipelineConfig::default(),
            Environment::from_process(),
            Arc::new(SystemRunner::new()),
        )
    }

    /// Pin the date used for derived channel ids.
    pub fn with_clock(mut self, today: impl Fn() -> NaiveDate + Send + Sync + 'static) -> Self {
        self.today = Arc::new(today);
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Channel for this request: the caller's, or one derived from the
    /// project name and today's UTC date.
    pub fn channel_for(&self, request: &PreviewRequest) -> ChannelId {
        match request.channel_id() {
            Some(id) => ChannelId::explicit(id),
            None => ChannelId::derive(request.project_name(), (self.today)()),
        }
    }

    /// Build and deploy one preview.
    ///
    /// The staged workspace is deleted before this returns, on success and on
    /// every error.
    pub async fn run(&self, request: &PreviewRequest) -> Result<PreviewResponse> {
        request.validate()?;
        let started = Instant::now();

        let project_id = config::resolve_hosting_project(request, &self.env)?;
        let channel = self.channel_for(request);
        let skeleton = config::resolve_skeleton_path(request, &self.env);

        tracing::info!(
            project = %project_id,
            channel = %channel,
            skeleton = %skeleton.display(),
            "Starting preview pipeline"
        );

        let workspace = self.stage(skeleton).await?;
        let result = self.run_staged(request, &workspace, &project_id, &channel).await;
        drop(workspace);

        match &result {
            Ok(url) => tracing::info!(
                channel = %channel,
                url = %url,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Preview deployed"
            ),
            Err(e) => tracing::warn!(
                channel = %channel,
                error = %e,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Preview pipeline failed"
            ),
        }

        Ok(PreviewResponse {
            preview_url: result?,
            channel_id: channel.into_string(),
        })
    }

    async fn stage(&self, skeleton: PathBuf) -> Result<StagedWorkspace> {
        let temp_base = self.config.temp_base.clone();
        let source = skeleton.clone();
        tokio::task::spawn_blocking(move || StagedWorkspace::stage(&skeleton, temp_base.as_deref()))
            .await
            .map_err(|e| PipelineError::io("staging task failed", source, std::io::Error::other(e)))?
    }

    async fn run_staged(
        &self,
        request: &PreviewRequest,
        workspace: &StagedWorkspace,
        project_id: &str,
        channel: &ChannelId,
    ) -> Result<String> {
        let runner = self.runner.as_ref();

        let generator_dir = config::resolve_generator_dir(&self.env);
        let (page_plan, source) = plan::obtain(request, &generator_dir, runner, &self.config).await?;
        tracing::info!(source = ?source, "Page plan ready");

        build::prepare(workspace.path(), &page_plan, runner, &self.config).await?;
        deploy::deploy(workspace.path(), project_id, channel, runner, &self.config).await
    }
}
