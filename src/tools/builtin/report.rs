//! Thin tool wrapper exposing `agent::report::ReportGenerator` to the chat loop.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::agent::{GenerateReportRequest, ReportGenerator, ReportStyle, SourceStrategy};
use crate::context::JobContext;
use crate::tools::tool::{Tool, ToolError, ToolOutput};

pub struct GenerateReportTool {
    generator: ReportGenerator,
}

impl GenerateReportTool {
    pub fn new(generator: ReportGenerator) -> Self {
        Self { generator }
    }
}

#[async_trait]
impl Tool for GenerateReportTool {
    fn name(&self) -> &str {
        "generate_report"
    }

    fn description(&self) -> &str {
        "Generate or revise a Markdown research report on a topic. Use when the user asks for a \
         written report, summary document, or to revise one already produced in this thread."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "topic": {"type": "string", "description": "The report's subject"},
                "source_content": {
                    "type": "string",
                    "description": "Text to base the report on, when the user supplied or pasted it"
                },
                "source_strategy": {
                    "type": "string",
                    "enum": ["provided", "conversation", "kb_search", "auto"],
                    "description": "Where to pull source material from"
                },
                "search_queries": {
                    "type": "array",
                    "items": {"type": "string"},
                    "description": "Queries to run against the knowledge base when source_strategy needs it"
                },
                "style": {
                    "type": "string",
                    "enum": ["brief", "detailed", "deep_research"],
                    "description": "Desired report length and depth"
                },
                "user_instructions": {"type": "string", "description": "Extra formatting or tone instructions"},
                "parent_report_id": {"type": "string", "description": "Id of a prior report to revise instead of writing a new one"}
            },
            "required": ["topic"]
        })
    }

    async fn execute(&self, params: Value, ctx: &JobContext) -> Result<ToolOutput, ToolError> {
        let start = std::time::Instant::now();
        let topic = params
            .get("topic")
            .and_then(Value::as_str)
            .ok_or_else(|| ToolError::InvalidParameters("missing 'topic' parameter".to_string()))?
            .to_string();

        let source_content = params.get("source_content").and_then(Value::as_str).unwrap_or_default().to_string();
        let source_strategy = params
            .get("source_strategy")
            .and_then(Value::as_str)
            .map(SourceStrategy::parse)
            .unwrap_or(SourceStrategy::Auto);
        let search_queries = params
            .get("search_queries")
            .and_then(Value::as_array)
            .map(|a| a.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
            .unwrap_or_default();
        let style = params.get("style").and_then(Value::as_str).map(ReportStyle::parse).unwrap_or(ReportStyle::Detailed);
        let user_instructions = params.get("user_instructions").and_then(Value::as_str).map(str::to_string);
        let parent_report_id = params
            .get("parent_report_id")
            .and_then(Value::as_str)
            .map(Uuid::parse_str)
            .transpose()
            .map_err(|e| ToolError::InvalidParameters(format!("invalid 'parent_report_id': {e}")))?;

        let report = self
            .generator
            .generate(GenerateReportRequest {
                search_space_id: ctx.search_space_id,
                topic,
                source_content,
                source_strategy,
                search_queries,
                style,
                user_instructions,
                parent_report_id,
                model: ctx.services.config.llm_model.clone(),
            })
            .await
            .map_err(|e| ToolError::ExecutionFailed(e.to_string()))?;

        let result = json!({
            "report_id": report.report.id,
            "title": report.report.title,
            "content": report.report.content,
            "is_revision": report.is_revision,
            "word_count": report.metadata.word_count,
            "char_count": report.metadata.char_count,
            "section_count": report.metadata.section_count,
        });
        Ok(ToolOutput::success(result, start.elapsed()))
    }

    fn estimated_duration(&self, _params: &Value) -> Option<Duration> {
        Some(Duration::from_secs(20))
    }
}
