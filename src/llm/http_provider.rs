//! An HTTP-backed `LlmProvider` speaking the OpenAI-compatible `chat/completions` shape, the
//! same request/response family most self-hosted and vendor-compatible endpoints accept.
//!
//! Mirrors `embedding::HttpEmbeddingProvider`'s shape: one vendor-agnostic HTTP client per
//! provider, registered into the router by model-name prefix.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{ChatMessage, ChatRole, CompletionRequest, CompletionResponse, LlmProvider, ToolCall, ToolCompletionRequest};
use crate::error::LlmError;

pub struct HttpLlmProvider {
    client: reqwest::Client,
    endpoint: String,
    api_key: SecretString,
    model_prefixes: Vec<String>,
}

impl HttpLlmProvider {
    pub fn new(endpoint: impl Into<String>, api_key: SecretString, model_prefixes: Vec<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
            api_key,
            model_prefixes,
        }
    }
}

#[derive(Serialize)]
struct WireMessage<'a> {
    role: &'a str,
    content: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<&'a str>,
}

#[derive(Serialize)]
struct WireFunction<'a> {
    name: &'a str,
    description: &'a str,
    parameters: &'a Value,
}

#[derive(Serialize)]
struct WireTool<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    function: WireFunction<'a>,
}

#[derive(Serialize)]
struct WireRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<WireTool<'a>>,
}

#[derive(Deserialize)]
struct WireResponse {
    choices: Vec<WireChoice>,
}

#[derive(Deserialize)]
struct WireChoice {
    message: WireResponseMessage,
}

#[derive(Deserialize)]
struct WireResponseMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Vec<WireToolCall>,
}

#[derive(Deserialize)]
struct WireToolCall {
    id: String,
    function: WireToolCallFunction,
}

#[derive(Deserialize)]
struct WireToolCallFunction {
    name: String,
    arguments: String,
}

fn role_str(role: ChatRole) -> &'static str {
    match role {
        ChatRole::System => "system",
        ChatRole::User => "user",
        ChatRole::Assistant => "assistant",
        ChatRole::Tool => "tool",
    }
}

impl HttpLlmProvider {
    async fn send(&self, base: &CompletionRequest, tools: Vec<WireTool<'_>>) -> Result<CompletionResponse, LlmError> {
        let messages: Vec<WireMessage> = base
            .messages
            .iter()
            .map(|m| WireMessage {
                role: role_str(m.role),
                content: &m.content,
                tool_call_id: m.tool_call_id.as_deref(),
            })
            .collect();

        let body = WireRequest {
            model: &base.model,
            messages,
            temperature: base.temperature,
            max_tokens: base.max_tokens,
            tools,
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.endpoint))
            .bearer_auth(self.api_key.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LlmError::Timeout
                } else {
                    LlmError::Request(e.to_string())
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(LlmError::Request(format!("provider returned {status}: {text}")));
        }

        let parsed: WireResponse = response.json().await.map_err(|e| LlmError::InvalidResponse(e.to_string()))?;
        let choice = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| LlmError::InvalidResponse("response had no choices".to_string()))?;

        let tool_calls = choice
            .message
            .tool_calls
            .into_iter()
            .map(|tc| {
                let arguments = serde_json::from_str(&tc.function.arguments).unwrap_or(Value::Null);
                ToolCall {
                    id: tc.id,
                    name: tc.function.name,
                    arguments,
                }
            })
            .collect();

        Ok(CompletionResponse {
            content: choice.message.content.unwrap_or_default(),
            tool_calls,
        })
    }
}

#[async_trait]
impl LlmProvider for HttpLlmProvider {
    fn handles(&self, model: &str) -> bool {
        self.model_prefixes.iter().any(|p| model.starts_with(p.as_str()))
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        self.send(&request, vec![]).await
    }

    async fn complete_with_tools(&self, request: ToolCompletionRequest) -> Result<CompletionResponse, LlmError> {
        let tools = request
            .tools
            .iter()
            .map(|t| WireTool {
                kind: "function",
                function: WireFunction {
                    name: &t.name,
                    description: &t.description,
                    parameters: &t.parameters_schema,
                },
            })
            .collect();
        self.send(&request.base, tools).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handles_matches_registered_prefixes() {
        let provider = HttpLlmProvider::new("https://api.example.com/v1", SecretString::from("key".to_string()), vec!["gpt-".to_string()]);
        assert!(provider.handles("gpt-4o-mini"));
        assert!(!provider.handles("claude-3"));
    }

    #[test]
    fn role_str_maps_all_roles() {
        assert_eq!(role_str(ChatRole::System), "system");
        assert_eq!(role_str(ChatRole::Tool), "tool");
    }
}
