//! The `Tool` trait: a single agent-callable capability, whether built-in, MCP-backed, or a
//! connector mutation. `agent::agent_loop` drives tools purely through this interface.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::context::JobContext;

pub use crate::error::ToolError;

/// Result of a single tool invocation, independent of success/failure (that's `Result`).
#[derive(Debug, Clone)]
pub struct ToolOutput {
    /// Structured result, passed back to the model as a tool message.
    pub value: Value,
    /// Raw, unparsed payload (e.g. an HTTP response body) kept for sanitization/citation.
    pub raw: Option<String>,
    pub duration: Duration,
}

impl ToolOutput {
    pub fn success(value: Value, duration: Duration) -> Self {
        Self {
            value,
            raw: None,
            duration,
        }
    }

    pub fn text(content: impl Into<String>, duration: Duration) -> Self {
        let content = content.into();
        Self {
            value: Value::String(content.clone()),
            raw: Some(content),
            duration,
        }
    }

    pub fn with_raw(mut self, raw: impl Into<String>) -> Self {
        self.raw = Some(raw.into());
        self
    }
}

/// A capability the agent can invoke mid-turn.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    fn parameters_schema(&self) -> Value;

    async fn execute(&self, params: Value, ctx: &JobContext) -> Result<ToolOutput, ToolError>;

    /// Best-effort duration estimate for planning/progress display; `None` if unknown.
    fn estimated_duration(&self, _params: &Value) -> Option<Duration> {
        None
    }

    /// Whether this tool's output must pass through the agent's sanitization pass before being
    /// shown to the model (true for anything that touches external/untrusted content).
    fn requires_sanitization(&self) -> bool {
        false
    }

    /// Whether invoking this tool requires explicit user approval before execution.
    fn requires_approval(&self) -> bool {
        false
    }
}
