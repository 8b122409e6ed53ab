//! LLM provider abstraction (C2): uniform inference across vendors, with a router that
//! load-balances across configured providers by model name.

pub mod http_provider;
pub mod reasoning;

pub use http_provider::HttpLlmProvider;
pub use reasoning::{ActionPlan, PlannedAction, Reasoning, ReasoningContext, SuccessEvaluation, ToolSelection};

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::LlmError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatRole {
    System,
    User,
    Assistant,
    Tool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
    #[serde(default)]
    pub tool_call_id: Option<String>,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
            tool_call_id: None,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
            tool_call_id: None,
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
            tool_call_id: None,
        }
    }
}

/// A JSON-schema tool definition offered to the model for tool-calling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters_schema: serde_json::Value,
}

#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

#[derive(Debug, Clone)]
pub struct ToolCompletionRequest {
    pub base: CompletionRequest,
    pub tools: Vec<ToolDefinition>,
}

#[derive(Debug, Clone)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: serde_json::Value,
}

#[derive(Debug, Clone)]
pub struct CompletionResponse {
    pub content: String,
    pub tool_calls: Vec<ToolCall>,
}

/// Uniform inference interface implemented once per vendor (OpenAI, Anthropic, a local model,
/// etc.). `HttpLlmProvider` implements this directly against an OpenAI-compatible HTTP endpoint;
/// a new vendor with an incompatible wire format gets its own `LlmProvider` impl alongside it.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Model name prefixes this provider serves, e.g. `["gpt-", "o1-"]`.
    fn handles(&self, model: &str) -> bool;

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError>;

    async fn complete_with_tools(
        &self,
        request: ToolCompletionRequest,
    ) -> Result<CompletionResponse, LlmError>;
}

/// Routes a completion request to the provider registered for its model name.
pub struct LlmRouter {
    providers: Vec<Arc<dyn LlmProvider>>,
    default_model: String,
}

impl LlmRouter {
    pub fn new(default_model: impl Into<String>) -> Self {
        Self {
            providers: Vec::new(),
            default_model: default_model.into(),
        }
    }

    pub fn register(mut self, provider: Arc<dyn LlmProvider>) -> Self {
        self.providers.push(provider);
        self
    }

    fn resolve(&self, model: &str) -> Result<&Arc<dyn LlmProvider>, LlmError> {
        self.providers
            .iter()
            .find(|p| p.handles(model))
            .ok_or_else(|| LlmError::NoProvider {
                model: model.to_string(),
            })
    }

    pub async fn complete(&self, mut request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        if request.model.is_empty() {
            request.model = self.default_model.clone();
        }
        let provider = self.resolve(&request.model)?;
        provider.complete(request).await
    }

    pub async fn complete_with_tools(
        &self,
        mut request: ToolCompletionRequest,
    ) -> Result<CompletionResponse, LlmError> {
        if request.base.model.is_empty() {
            request.base.model = self.default_model.clone();
        }
        let provider = self.resolve(&request.base.model)?;
        provider.complete_with_tools(request).await
    }
}

/// Summarization prompt applied to every canonical document during ingestion (§4.2 step 4).
pub fn summarization_prompt(canonical_document: &str) -> Vec<ChatMessage> {
    vec![
        ChatMessage::system(
            "You summarize documents for a personal knowledge base. Produce a concise, \
             information-dense summary that preserves names, dates, and decisions. Do not \
             editorialize.",
        ),
        ChatMessage::user(canonical_document.to_string()),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FakeProvider;

    #[async_trait]
    impl LlmProvider for FakeProvider {
        fn handles(&self, model: &str) -> bool {
            model.starts_with("fake-")
        }

        async fn complete(&self, _request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
            Ok(CompletionResponse {
                content: "ok".to_string(),
                tool_calls: vec![],
            })
        }

        async fn complete_with_tools(
            &self,
            _request: ToolCompletionRequest,
        ) -> Result<CompletionResponse, LlmError> {
            Ok(CompletionResponse {
                content: "ok".to_string(),
                tool_calls: vec![],
            })
        }
    }

    #[tokio::test]
    async fn router_dispatches_by_model_prefix() {
        let router = LlmRouter::new("fake-default").register(Arc::new(FakeProvider));
        let resp = router
            .complete(CompletionRequest {
                model: "fake-1".to_string(),
                messages: vec![ChatMessage::user("hi")],
                temperature: None,
                max_tokens: None,
            })
            .await
            .unwrap();
        assert_eq!(resp.content, "ok");
    }

    #[tokio::test]
    async fn router_errors_on_unknown_model() {
        let router = LlmRouter::new("fake-default").register(Arc::new(FakeProvider));
        let result = router
            .complete(CompletionRequest {
                model: "unknown-model".to_string(),
                messages: vec![],
                temperature: None,
                max_tokens: None,
            })
            .await;
        assert!(matches!(result, Err(LlmError::NoProvider { .. })));
    }
}
