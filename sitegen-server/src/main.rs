use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use sitegen_pipeline::PipelineController;
use sitegen_server::{AppState, ServerConfig, router};

#[tokio::main]
async fn main() -> Result<()> {
    // JSON logs in production (SITEGEN_LOG_JSON=1), human-readable otherwise
    let json_logs = std::env::var("SITEGEN_LOG_JSON").unwrap_or_default() == "1";
    let filter = EnvFilter::from_default_env()
        .add_directive("sitegen_server=info".parse()?)
        .add_directive("sitegen_pipeline=info".parse()?);
    if json_logs {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    let config = ServerConfig::parse();
    let controller = PipelineController::from_env();
    tracing::info!(config = ?controller.config(), "Pipeline configured");

    let state: Arc<AppState> = AppState::new(controller);
    let app = router(state);

    let addr = config.listen_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    tracing::info!("sitegen-server listening on {addr}");
    axum::serve(listener, app).await?;
    Ok(())
}
