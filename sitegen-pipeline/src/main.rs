//! sitegen-preview: run one preview deploy from the command line.
//!
//! Reads a request JSON object (same shape as `POST /generate_preview`) from
//! a file or stdin, runs the pipeline, and prints `{previewUrl, channelId}`.
//!
//!   sitegen-preview --request intake.json
//!   sitegen-preview --request intake.json --skeleton ../skeleton --project demo
//!   echo '{"projectName":"Acme","pagePlanJson":{...}}' | sitegen-preview --request -
//!
//! Needs node, npm and firebase-tools on PATH.

use std::io::Read;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;

use sitegen_pipeline::config::{Environment, PipelineConfig};
use sitegen_pipeline::request::{FIELD_CHANNEL_ID, FIELD_FIREBASE_PROJECT_ID, FIELD_SKELETON_PATH};
use sitegen_pipeline::{PipelineController, PreviewRequest, SystemRunner};

#[derive(Parser)]
#[command(name = "sitegen-preview", about = "Build a site from a page plan and deploy it to a hosting preview channel")]
struct Args {
    /// Request JSON file, or `-` for stdin
    #[arg(long, default_value = "-")]
    request: String,

    /// Skeleton project to stage (overrides the request and SITEGEN_SKELETON_DIR)
    #[arg(long)]
    skeleton: Option<PathBuf>,

    /// Hosting project id (overrides the request and FIREBASE_PROJECT)
    #[arg(long)]
    project: Option<String>,

    /// Preview channel id (skips derivation from the project name)
    #[arg(long)]
    channel: Option<String>,

    /// Package manager used for install/validate/build
    #[arg(long, default_value = "npm")]
    package_manager: String,

    /// Hosting CLI used for the deploy
    #[arg(long, default_value = "firebase")]
    hosting_cli: String,

    /// Directory to create per-run temp workspaces in
    #[arg(long)]
    temp_dir: Option<PathBuf>,

    /// Timeout in seconds for the slow steps (install, build, deploy)
    #[arg(long, default_value_t = 600)]
    step_timeout: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    // stdout carries the response, so logs go to stderr
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "sitegen_pipeline=info".into());
    if std::env::var("SITEGEN_LOG_JSON").unwrap_or_default() == "1" {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }

    let args = Args::parse();

    let raw = if args.request == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("Failed to read request from stdin")?;
        buf
    } else {
        tokio::fs::read_to_string(&args.request)
            .await
            .with_context(|| format!("Failed to read {}", args.request))?
    };

    let mut request: PreviewRequest =
        serde_json::from_str(&raw).context("Request must be a JSON object")?;
    if let Some(skeleton) = &args.skeleton {
        request.set(FIELD_SKELETON_PATH, skeleton.display().to_string());
    }
    if let Some(project) = args.project {
        request.set(FIELD_FIREBASE_PROJECT_ID, project);
    }
    if let Some(channel) = args.channel {
        request.set(FIELD_CHANNEL_ID, channel);
    }

    let mut config = PipelineConfig {
        package_manager: args.package_manager,
        hosting_cli: args.hosting_cli,
        temp_base: args.temp_dir,
        ..Default::default()
    };
    let slow = Duration::from_secs(args.step_timeout);
    config.timeouts.install = slow;
    config.timeouts.build = slow;
    config.timeouts.deploy = slow;

    let controller = PipelineController::new(
        config,
        Environment::from_process(),
        std::sync::Arc::new(SystemRunner::new()),
    );

    let response = controller.run(&request).await?;
    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}
