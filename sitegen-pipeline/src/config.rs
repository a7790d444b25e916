//! Pipeline configuration and the ordered lookups behind it.
//!
//! Each setting that can come from more than one place is resolved by exactly
//! one function here, with its precedence spelled out in order:
//!
//! | setting            | order                                                        |
//! |--------------------|--------------------------------------------------------------|
//! | hosting project id | request → `FIREBASE_PROJECT` → `GOOGLE_CLOUD_PROJECT`        |
//! | skeleton path      | request → `SITEGEN_SKELETON_DIR` → `/workspace` (if present) → `/app/skeleton` |
//! | generator location | `SITEGEN_ADK_DIR` → `/app/adk`; if missing, `<checkout>/adk`  |

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{PipelineError, Result};
use crate::request::PreviewRequest;

pub const ENV_FIREBASE_PROJECT: &str = "FIREBASE_PROJECT";
pub const ENV_GOOGLE_CLOUD_PROJECT: &str = "GOOGLE_CLOUD_PROJECT";
pub const ENV_SKELETON_DIR: &str = "SITEGEN_SKELETON_DIR";
pub const ENV_GENERATOR_DIR: &str = "SITEGEN_ADK_DIR";

/// Read-only workspace mount used by local docker-compose setups.
pub const MOUNTED_SKELETON_DIR: &str = "/workspace";
/// Skeleton copy baked into the container image.
pub const BAKED_SKELETON_DIR: &str = "/app/skeleton";
/// Generator install location inside the container image.
pub const BAKED_GENERATOR_DIR: &str = "/app/adk";

/// Snapshot of the process environment.
///
/// Taken once when the controller is built; requests only ever read it.
#[derive(Debug, Clone, Default)]
pub struct Environment {
    vars: HashMap<String, String>,
}

impl Environment {
    pub fn from_process() -> Self {
        Self {
            vars: std::env::vars().collect(),
        }
    }

    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            vars: pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }

    /// Value of `key`, treating an empty value as unset.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str).filter(|v| !v.is_empty())
    }
}

/// Per-step limits for external commands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepTimeouts {
    pub generate: Duration,
    pub install: Duration,
    pub validate: Duration,
    pub build: Duration,
    pub deploy: Duration,
}

impl Default for StepTimeouts {
    fn default() -> Self {
        Self {
            generate: Duration::from_secs(300),
            install: Duration::from_secs(600),
            validate: Duration::from_secs(120),
            build: Duration::from_secs(600),
            deploy: Duration::from_secs(600),
        }
    }
}

/// Tool names and limits used by the pipeline.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Package manager driving install/validate/build.
    pub package_manager: String,
    /// Hosting CLI used for the preview deploy.
    pub hosting_cli: String,
    /// Interpreter that runs the page plan generator.
    pub generator_program: String,
    /// Generator entry point, relative to the generator location.
    pub generator_script: String,
    /// Parent for per-request temp roots; `None` means the OS temp dir.
    pub temp_base: Option<PathBuf>,
    pub timeouts: StepTimeouts,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            package_manager: "npm".to_string(),
            hosting_cli: "firebase".to_string(),
            generator_program: "node".to_string(),
            generator_script: "src/generate-page-plan.mjs".to_string(),
            temp_base: None,
            timeouts: StepTimeouts::default(),
        }
    }
}

/// Hosting project the preview is deployed into.
pub fn resolve_hosting_project(request: &PreviewRequest, env: &Environment) -> Result<String> {
    request
        .firebase_project_id()
        .or_else(|| env.get(ENV_FIREBASE_PROJECT))
        .or_else(|| env.get(ENV_GOOGLE_CLOUD_PROJECT))
        .map(str::to_string)
        .ok_or(PipelineError::MissingConfiguration)
}

/// Skeleton project to stage.
pub fn resolve_skeleton_path(request: &PreviewRequest, env: &Environment) -> PathBuf {
    resolve_skeleton_path_with(request, env, Path::exists)
}

pub(crate) fn resolve_skeleton_path_with(
    request: &PreviewRequest,
    env: &Environment,
    exists: impl Fn(&Path) -> bool,
) -> PathBuf {
    if let Some(path) = request.skeleton_path() {
        return PathBuf::from(path);
    }
    if let Some(path) = env.get(ENV_SKELETON_DIR) {
        return PathBuf::from(path);
    }
    let mounted = Path::new(MOUNTED_SKELETON_DIR);
    if exists(mounted) {
        mounted.to_path_buf()
    } else {
        PathBuf::from(BAKED_SKELETON_DIR)
    }
}

/// Working directory for the page plan generator.
pub fn resolve_generator_dir(env: &Environment) -> PathBuf {
    resolve_generator_dir_with(env, Path::exists)
}

pub(crate) fn resolve_generator_dir_with(env: &Environment, exists: impl Fn(&Path) -> bool) -> PathBuf {
    let preferred = PathBuf::from(env.get(ENV_GENERATOR_DIR).unwrap_or(BAKED_GENERATOR_DIR));
    if exists(&preferred) {
        preferred
    } else {
        checkout_generator_dir()
    }
}

/// `<checkout root>/adk`, next to this crate in a source checkout.
pub fn checkout_generator_dir() -> PathBuf {
    let manifest_dir = Path::new(env!("CARGO_MANIFEST_DIR"));
    manifest_dir
        .parent()
        .unwrap_or(manifest_dir)
        .join("adk")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request(value: serde_json::Value) -> PreviewRequest {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn hosting_project_prefers_request_then_env_in_order() {
        let env = Environment::from_pairs([
            (ENV_FIREBASE_PROJECT, "from-firebase-env"),
            (ENV_GOOGLE_CLOUD_PROJECT, "from-gcp-env"),
        ]);

        let req = request(json!({"projectName": "x", "firebaseProjectId": "from-request"}));
        assert_eq!(resolve_hosting_project(&req, &env).unwrap(), "from-request");

        let req = request(json!({"projectName": "x"}));
        assert_eq!(resolve_hosting_project(&req, &env).unwrap(), "from-firebase-env");

        let env = Environment::from_pairs([(ENV_GOOGLE_CLOUD_PROJECT, "from-gcp-env")]);
        assert_eq!(resolve_hosting_project(&req, &env).unwrap(), "from-gcp-env");
    }

    #[test]
    fn empty_values_count_as_unset() {
        let env = Environment::from_pairs([
            (ENV_FIREBASE_PROJECT, ""),
            (ENV_GOOGLE_CLOUD_PROJECT, "from-gcp-env"),
        ]);
        let req = request(json!({"projectName": "x", "firebaseProjectId": ""}));
        assert_eq!(resolve_hosting_project(&req, &env).unwrap(), "from-gcp-env");
    }

    #[test]
    fn missing_hosting_project_is_a_configuration_error() {
        let req = request(json!({"projectName": "x"}));
        let err = resolve_hosting_project(&req, &Environment::default()).unwrap_err();
        assert!(matches!(err, PipelineError::MissingConfiguration));
    }

    #[test]
    fn skeleton_path_precedence() {
        let env = Environment::from_pairs([(ENV_SKELETON_DIR, "/env/skeleton")]);
        let everything_exists = |_: &Path| true;
        let nothing_exists = |_: &Path| false;

        let req = request(json!({"projectName": "x", "skeletonPath": "/req/skeleton"}));
        assert_eq!(
            resolve_skeleton_path_with(&req, &env, everything_exists),
            PathBuf::from("/req/skeleton")
        );

        let req = request(json!({"projectName": "x"}));
        assert_eq!(
            resolve_skeleton_path_with(&req, &env, everything_exists),
            PathBuf::from("/env/skeleton")
        );

        let env = Environment::default();
        assert_eq!(
            resolve_skeleton_path_with(&req, &env, everything_exists),
            PathBuf::from(MOUNTED_SKELETON_DIR)
        );
        assert_eq!(
            resolve_skeleton_path_with(&req, &env, nothing_exists),
            PathBuf::from(BAKED_SKELETON_DIR)
        );
    }

    #[test]
    fn generator_dir_falls_back_to_checkout_when_missing() {
        let env = Environment::from_pairs([(ENV_GENERATOR_DIR, "/custom/adk")]);
        assert_eq!(
            resolve_generator_dir_with(&env, |_| true),
            PathBuf::from("/custom/adk")
        );
        // An override that does not exist is skipped, not trusted.
        assert_eq!(resolve_generator_dir_with(&env, |_| false), checkout_generator_dir());

        let env = Environment::default();
        assert_eq!(
            resolve_generator_dir_with(&env, |p| p == Path::new(BAKED_GENERATOR_DIR)),
            PathBuf::from(BAKED_GENERATOR_DIR)
        );
        assert!(checkout_generator_dir().ends_with("adk"));
    }
}
