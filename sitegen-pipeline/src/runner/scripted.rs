//! A [`CommandRunner`] that replays canned output, for tests.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use super::{CommandOutput, CommandRunner, Invocation, Step};
use crate::error::{PipelineError, Result};

/// Canned responses per step, with every call recorded.
///
/// Used by tests to drive the pipeline without node or firebase installed.
/// Steps without a scripted response succeed with empty output.
#[derive(Debug, Default)]
pub struct ScriptedRunner {
    responses: HashMap<Step, CommandOutput>,
    missing_tools: Vec<String>,
    calls: Mutex<Vec<Invocation>>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer every `step` command with `output`.
    pub fn with(mut self, step: Step, output: CommandOutput) -> Self {
        self.responses.insert(step, output);
        self
    }

    /// Pretend `program` is not installed.
    pub fn without_tool(mut self, program: &str) -> Self {
        self.missing_tools.push(program.to_string());
        self
    }

    /// Every invocation seen so far, in call order.
    pub fn calls(&self) -> Vec<Invocation> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// The step of every invocation seen so far, in call order.
    pub fn steps(&self) -> Vec<Step> {
        self.calls().iter().map(|c| c.step).collect()
    }
}

#[async_trait]
impl CommandRunner for ScriptedRunner {
    async fn run(&self, invocation: &Invocation) -> Result<CommandOutput> {
        if self.missing_tools.contains(&invocation.program) {
            return Err(PipelineError::ToolNotFound(invocation.program.clone()));
        }
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(invocation.clone());
        Ok(self
            .responses
            .get(&invocation.step)
            .cloned()
            .unwrap_or_else(|| CommandOutput::success("")))
    }
}
