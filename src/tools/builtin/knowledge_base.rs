//! Tool wrapper exposing `retrieval::RetrievalEngine` as a callable search action.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::context::JobContext;
use crate::retrieval::{RetrievalEngine, RetrievalMode, SearchRequest};
use crate::tools::tool::{Tool, ToolError, ToolOutput};

const DEFAULT_TOP_K: usize = 10;

pub struct SearchKnowledgeBaseTool {
    retrieval: Arc<RetrievalEngine>,
}

impl SearchKnowledgeBaseTool {
    pub fn new(retrieval: Arc<RetrievalEngine>) -> Self {
        Self { retrieval }
    }
}

#[async_trait]
impl Tool for SearchKnowledgeBaseTool {
    fn name(&self) -> &str {
        "search_knowledge_base"
    }

    fn description(&self) -> &str {
        "Search the user's indexed documents (connectors, uploads, conversation history) for \
         content relevant to a query. Use this before answering questions the conversation \
         alone can't answer."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {"type": "string", "description": "The search query"},
                "top_k": {"type": "integer", "description": "Maximum number of results (default 10)"},
                "mode": {
                    "type": "string",
                    "enum": ["chunks", "documents"],
                    "description": "Return individual matching chunks, or whole documents aggregated from their matching chunks"
                }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, params: Value, ctx: &JobContext) -> Result<ToolOutput, ToolError> {
        let start = std::time::Instant::now();
        let query = params
            .get("query")
            .and_then(Value::as_str)
            .ok_or_else(|| ToolError::InvalidParameters("missing 'query' parameter".to_string()))?;
        let top_k = params.get("top_k").and_then(Value::as_u64).map(|v| v as usize).unwrap_or(DEFAULT_TOP_K);
        let mode = match params.get("mode").and_then(Value::as_str) {
            Some("documents") => RetrievalMode::Documents,
            _ => RetrievalMode::Chunks,
        };

        let response = self
            .retrieval
            .search(SearchRequest {
                user_id: &ctx.user_id,
                search_space_id: ctx.search_space_id,
                query,
                top_k,
                mode,
                enabled_document_types: None,
                web_providers: vec![],
            })
            .await
            .map_err(|e| ToolError::ExecutionFailed(e.to_string()))?;

        let citable_chunks: Vec<Value> = response
            .citable_chunks
            .iter()
            .map(|c| {
                json!({
                    "chunk_id": c.chunk_id,
                    "content": c.content,
                    "score": c.score,
                    "document_id": c.document_id,
                    "document_title": c.document_title,
                    "document_type": c.document_type,
                })
            })
            .collect();

        let result = json!({
            "citable_chunks": citable_chunks,
            "sources": response.envelopes,
        });
        Ok(ToolOutput::success(result, start.elapsed()))
    }

    fn estimated_duration(&self, _params: &Value) -> Option<Duration> {
        Some(Duration::from_secs(3))
    }
}
