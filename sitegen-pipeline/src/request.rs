//! Request and response shapes for one preview deploy.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{PipelineError, Result};

pub const FIELD_PROJECT_NAME: &str = "projectName";
pub const FIELD_FIREBASE_PROJECT_ID: &str = "firebaseProjectId";
pub const FIELD_CHANNEL_ID: &str = "channelId";
pub const FIELD_PAGE_PLAN: &str = "pagePlanJson";
pub const FIELD_SKELETON_PATH: &str = "skeletonPath";

/// A request to build and deploy one site preview: the caller's JSON object,
/// kept as sent.
///
/// The pipeline reads a handful of identifiers out of it. Business fields
/// (`industry`, `location`, `services`, `brandNotes`, `cta`, ...) are not
/// interpreted here and reach the page plan generator exactly as received,
/// `null`s and odd types included.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PreviewRequest {
    fields: Map<String, Value>,
}

impl PreviewRequest {
    pub fn new(project_name: impl Into<String>) -> Self {
        Self::default().with(FIELD_PROJECT_NAME, project_name.into())
    }

    pub fn from_fields(fields: Map<String, Value>) -> Self {
        Self { fields }
    }

    /// Set `key`, replacing whatever the caller sent for it.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(key.into(), value.into());
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    /// `projectName`, or `""` when it is missing or not a string.
    pub fn project_name(&self) -> &str {
        self.fields
            .get(FIELD_PROJECT_NAME)
            .and_then(Value::as_str)
            .unwrap_or("")
    }

    /// Reject requests the pipeline cannot act on.
    pub fn validate(&self) -> Result<()> {
        if self.project_name().is_empty() {
            return Err(PipelineError::InvalidRequest("projectName is required".to_string()));
        }
        Ok(())
    }

    pub fn firebase_project_id(&self) -> Option<&str> {
        self.non_empty_str(FIELD_FIREBASE_PROJECT_ID)
    }

    pub fn channel_id(&self) -> Option<&str> {
        self.non_empty_str(FIELD_CHANNEL_ID)
    }

    pub fn skeleton_path(&self) -> Option<&str> {
        self.non_empty_str(FIELD_SKELETON_PATH)
    }

    /// Ready-made page plan; skips generation. An explicit `null` counts as
    /// absent.
    pub fn page_plan(&self) -> Option<&Value> {
        self.fields.get(FIELD_PAGE_PLAN).filter(|plan| !plan.is_null())
    }

    /// The request as the generator expects it on stdin: `{"intake": {...}}`.
    pub fn to_intake(&self) -> Value {
        serde_json::json!({ "intake": self.fields })
    }

    fn non_empty_str(&self, key: &str) -> Option<&str> {
        self.fields
            .get(key)
            .and_then(Value::as_str)
            .filter(|v| !v.is_empty())
    }
}

/// Where the preview ended up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewResponse {
    pub preview_url: String,
    pub channel_id: String,
}
