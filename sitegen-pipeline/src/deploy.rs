//! Preview channel deploys and preview URL extraction.
//!
//! `firebase hosting:channel:deploy --json` output varies between CLI
//! versions, and progress lines or warnings can end up mixed into it. The URL
//! is therefore looked up in two tiers:
//!
//! 1. parse stdout as JSON and take the first preview-looking string found
//!    depth-first;
//! 2. only if that parse fails, regex-scan the raw text and take the last
//!    match, since summary lines come after progress output.

use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::channel::ChannelId;
use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result, excerpt};
use crate::runner::{CommandOutput, CommandRunner, Invocation, Step};

const PREVIEW_HOST_SUFFIXES: [&str; 2] = [".web.app", ".firebaseapp.com"];

/// How much deploy output an unverifiable-deploy error keeps.
const UNVERIFIABLE_OUTPUT_EXCERPT_CHARS: usize = 2000;

static PREVIEW_URL_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)https://[a-z0-9-]+--[a-z0-9-]+\.(?:web\.app|firebaseapp\.com)\b")
        .expect("preview URL pattern is valid")
});

/// Outcome of a deploy command whose exit status was zero.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployResult {
    pub preview_url: Option<String>,
}

/// The deploy command for `channel` in `project`.
pub fn deploy_invocation(
    workspace: &Path,
    project_id: &str,
    channel: &ChannelId,
    config: &PipelineConfig,
) -> Invocation {
    Invocation::new(
        Step::Deploy,
        &config.hosting_cli,
        &[
            "hosting:channel:deploy",
            channel.as_str(),
            "--project",
            project_id,
            "--json",
        ],
        workspace,
    )
    .with_timeout(config.timeouts.deploy)
}

/// Deploy the built site in `workspace` to a preview channel and return its
/// URL.
///
/// A zero exit with no recognizable URL is an error of its own
/// ([`PipelineError::DeployResultUnverifiable`]), distinct from the command
/// failing.
pub async fn deploy(
    workspace: &Path,
    project_id: &str,
    channel: &ChannelId,
    runner: &dyn CommandRunner,
    config: &PipelineConfig,
) -> Result<String> {
    let invocation = deploy_invocation(workspace, project_id, channel, config);
    tracing::info!(project = %project_id, channel = %channel, "Deploying preview channel");

    let output = runner.run(&invocation).await?.check(&invocation)?;
    let result = extract_preview_url(&output);
    result
        .preview_url
        .ok_or_else(|| PipelineError::DeployResultUnverifiable {
            channel: channel.to_string(),
            output: excerpt(&output.combined(), UNVERIFIABLE_OUTPUT_EXCERPT_CHARS),
        })
}

/// Apply both extraction tiers to a finished deploy command.
pub fn extract_preview_url(output: &CommandOutput) -> DeployResult {
    let preview_url = match serde_json::from_str::<Value>(&output.stdout) {
        Ok(payload) => find_preview_url(&payload).map(str::to_string),
        Err(e) => {
            tracing::debug!(error = %e, "Deploy output is not JSON, scanning text");
            scan_preview_url(&output.combined())
        }
    };
    DeployResult { preview_url }
}

/// First preview URL in `value`, depth-first in document order.
pub fn find_preview_url(value: &Value) -> Option<&str> {
    match value {
        Value::String(s) if is_preview_url(s) => Some(s.as_str()),
        Value::Array(items) => items.iter().find_map(find_preview_url),
        Value::Object(map) => map.values().find_map(find_preview_url),
        _ => None,
    }
}

/// Last preview URL appearing anywhere in `text`.
pub fn scan_preview_url(text: &str) -> Option<String> {
    PREVIEW_URL_PATTERN
        .find_iter(text)
        .last()
        .map(|m| m.as_str().to_string())
}

fn is_preview_url(s: &str) -> bool {
    s.starts_with("https://")
        && s.contains("--")
        && PREVIEW_HOST_SUFFIXES.iter().any(|suffix| s.ends_with(suffix))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::ScriptedRunner;
    use serde_json::json;

    #[test]
    fn finds_nested_url_in_json() {
        let payload = json!({
            "status": "success",
            "result": {
                "sites": [
                    {"site": "demo", "meta": {"urls": ["https://example.com", {"preview": "https://preview--myproj.web.app"}]}}
                ]
            }
        });
        assert_eq!(find_preview_url(&payload), Some("https://preview--myproj.web.app"));
    }

    #[test]
    fn json_search_returns_first_match_in_document_order() {
        let payload = json!({
            "zzz": "https://first--demo.firebaseapp.com",
            "aaa": ["https://second--demo.web.app"]
        });
        assert_eq!(find_preview_url(&payload), Some("https://first--demo.firebaseapp.com"));
    }

    #[test]
    fn json_search_ignores_non_preview_strings() {
        let payload = json!({
            "console": "https://console.firebase.google.com/project/demo",
            "live": "https://demo.web.app",
            "http": "http://insecure--demo.web.app",
            "trailing": "https://demo--chan.web.app/index.html",
            "count": 3,
            "ok": true,
            "none": null
        });
        assert_eq!(find_preview_url(&payload), None);
    }

    #[test]
    fn text_scan_takes_the_last_match() {
        let text = "\
i  hosting[demo]: beginning deploy...
✔  hosting:channel: Channel URL (demo): https://demo--acme-old-x1y2.web.app [expires 2024-05-08]
✔  hosting:channel: Channel URL (demo): HTTPS://Demo--Acme-20240501-ab12.web.app [expires 2024-05-08]
";
        assert_eq!(
            scan_preview_url(text).as_deref(),
            Some("HTTPS://Demo--Acme-20240501-ab12.web.app")
        );
        assert_eq!(scan_preview_url("no urls here"), None);
    }

    #[test]
    fn text_tier_only_runs_when_json_parse_fails() {
        let not_json = CommandOutput::success("Deploying...\nhttps://demo--acme.web.app done");
        assert_eq!(
            extract_preview_url(&not_json).preview_url.as_deref(),
            Some("https://demo--acme.web.app")
        );

        // Valid JSON without a URL is final; the raw text is not rescanned.
        let json_without_url = CommandOutput {
            code: Some(0),
            stdout: "{\"status\":\"success\",\"note\":\"see https://x--y.web.app\"}".to_string(),
            stderr: String::new(),
        };
        assert_eq!(extract_preview_url(&json_without_url).preview_url, None);
    }

    #[test]
    fn text_tier_also_sees_stderr() {
        let output = CommandOutput {
            code: Some(0),
            stdout: "progress 100%".to_string(),
            stderr: "Channel URL: https://demo--acme.firebaseapp.com".to_string(),
        };
        assert_eq!(
            extract_preview_url(&output).preview_url.as_deref(),
            Some("https://demo--acme.firebaseapp.com")
        );
    }

    #[tokio::test]
    async fn deploy_builds_the_expected_command() {
        let stdout = r#"{"status":"success","result":{"demo":{"site":"demo","url":"https://demo--acme-20240501-ab12.web.app","expireTime":"2024-05-08T00:00:00Z"}}}"#;
        let runner = ScriptedRunner::new().with(Step::Deploy, CommandOutput::success(stdout));
        let channel = ChannelId::explicit("acme-20240501");

        let url = deploy(Path::new("/ws"), "demo", &channel, &runner, &PipelineConfig::default())
            .await
            .unwrap();

        assert_eq!(url, "https://demo--acme-20240501-ab12.web.app");
        assert_eq!(
            runner.calls()[0].command_line(),
            "firebase hosting:channel:deploy acme-20240501 --project demo --json"
        );
    }

    #[tokio::test]
    async fn successful_deploy_without_url_is_unverifiable() {
        let runner = ScriptedRunner::new().with(Step::Deploy, CommandOutput::success("{\"status\":\"success\"}"));
        let channel = ChannelId::explicit("acme-20240501");

        let err = deploy(Path::new("/ws"), "demo", &channel, &runner, &PipelineConfig::default())
            .await
            .unwrap_err();

        match err {
            PipelineError::DeployResultUnverifiable { channel, output } => {
                assert_eq!(channel, "acme-20240501");
                assert!(output.contains("\"status\":\"success\""));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn failed_deploy_is_a_command_failure() {
        let runner = ScriptedRunner::new().with(Step::Deploy, CommandOutput::failure(1, "", "Error: not authorized"));
        let err = deploy(Path::new("/ws"), "demo", &ChannelId::explicit("c"), &runner, &PipelineConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::CommandFailed { step: Step::Deploy, .. }));
    }
}
