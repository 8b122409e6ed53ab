//! LLM reasoning capabilities for planning, tool selection, and evaluation.
//!
//! Used by the agent loop to turn a user turn plus the available tool set into either a
//! direct response or one or more tool calls to execute.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::LlmError;
use crate::llm::{
    ChatMessage, CompletionRequest, LlmProvider, ToolCompletionRequest, ToolDefinition,
};

/// Context for reasoning operations.
pub struct ReasoningContext {
    /// Conversation history.
    pub messages: Vec<ChatMessage>,
    /// Available tools.
    pub available_tools: Vec<ToolDefinition>,
    /// Job description if working on a job.
    pub job_description: Option<String>,
    /// Model to route the request to.
    pub model: String,
}

impl ReasoningContext {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            messages: Vec::new(),
            available_tools: Vec::new(),
            job_description: None,
            model: model.into(),
        }
    }

    pub fn with_message(mut self, message: ChatMessage) -> Self {
        self.messages.push(message);
        self
    }

    pub fn with_tools(mut self, tools: Vec<ToolDefinition>) -> Self {
        self.available_tools = tools;
        self
    }

    pub fn with_job(mut self, description: impl Into<String>) -> Self {
        self.job_description = Some(description.into());
        self
    }
}

/// A planned action to take.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlannedAction {
    pub tool_name: String,
    pub parameters: serde_json::Value,
    pub reasoning: String,
    pub expected_outcome: String,
}

/// Result of planning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionPlan {
    pub goal: String,
    pub actions: Vec<PlannedAction>,
    pub estimated_time_secs: Option<u64>,
    pub confidence: f64,
}

/// Result of tool selection.
#[derive(Debug, Clone)]
pub struct ToolSelection {
    pub tool_name: String,
    pub parameters: serde_json::Value,
    pub reasoning: String,
}

/// Reasoning engine for the agent: wraps an [`LlmProvider`] with the prompts needed to plan,
/// select tools, evaluate outcomes, and hold a conversation.
pub struct Reasoning {
    llm: Arc<dyn LlmProvider>,
}

impl Reasoning {
    pub fn new(llm: Arc<dyn LlmProvider>) -> Self {
        Self { llm }
    }

    /// Generate a plan for completing a goal.
    pub async fn plan(&self, context: &ReasoningContext) -> Result<ActionPlan, LlmError> {
        let system_prompt = self.build_planning_prompt(context);

        let mut messages = vec![ChatMessage::system(system_prompt)];
        messages.extend(context.messages.clone());

        if let Some(ref job) = context.job_description {
            messages.push(ChatMessage::user(format!(
                "Please create a plan to complete this job:\n\n{}",
                job
            )));
        }

        let request = CompletionRequest {
            model: context.model.clone(),
            messages,
            temperature: Some(0.3),
            max_tokens: Some(2048),
        };

        let response = self.llm.complete(request).await?;
        self.parse_plan(&response.content)
    }

    /// Select tools to execute; may return multiple when the model determines they can run
    /// independently (fanned out by the caller with the usual bounded concurrency).
    pub async fn select_tools(
        &self,
        context: &ReasoningContext,
    ) -> Result<Vec<ToolSelection>, LlmError> {
        if context.available_tools.is_empty() {
            return Ok(vec![]);
        }

        let request = ToolCompletionRequest {
            base: CompletionRequest {
                model: context.model.clone(),
                messages: context.messages.clone(),
                temperature: Some(0.2),
                max_tokens: Some(1024),
            },
            tools: context.available_tools.clone(),
        };

        let response = self.llm.complete_with_tools(request).await?;
        let reasoning = response.content.clone();

        Ok(response
            .tool_calls
            .into_iter()
            .map(|tool_call| ToolSelection {
                tool_name: tool_call.name,
                parameters: tool_call.arguments,
                reasoning: reasoning.clone(),
            })
            .collect())
    }

    /// Evaluate whether a task was completed successfully.
    pub async fn evaluate_success(
        &self,
        context: &ReasoningContext,
        result: &str,
    ) -> Result<SuccessEvaluation, LlmError> {
        let system_prompt = r#"You are an evaluation assistant. Determine if a task was completed
successfully and respond in JSON: {"success": true/false, "confidence": 0.0-1.0, "reasoning": "...",
"issues": ["..."]}"#;

        let mut messages = vec![ChatMessage::system(system_prompt)];
        messages.push(match &context.job_description {
            Some(job) => ChatMessage::user(format!("Task description:\n{}\n\nResult:\n{}", job, result)),
            None => ChatMessage::user(format!("Result to evaluate:\n{}", result)),
        });

        let request = CompletionRequest {
            model: context.model.clone(),
            messages,
            temperature: Some(0.1),
            max_tokens: Some(1024),
        };

        let response = self.llm.complete(request).await?;
        self.parse_evaluation(&response.content)
    }

    /// Generate a conversational response with no tool access.
    pub async fn respond(&self, context: &ReasoningContext) -> Result<String, LlmError> {
        let request = CompletionRequest {
            model: context.model.clone(),
            messages: context.messages.clone(),
            temperature: Some(0.7),
            max_tokens: Some(2048),
        };

        let response = self.llm.complete(request).await?;
        Ok(response.content)
    }

    fn build_planning_prompt(&self, context: &ReasoningContext) -> String {
        let tools_desc = if context.available_tools.is_empty() {
            "No tools available.".to_string()
        } else {
            context
                .available_tools
                .iter()
                .map(|t| format!("- {}: {}", t.name, t.description))
                .collect::<Vec<_>>()
                .join("\n")
        };

        format!(
            r#"You are a planning assistant. Break the goal into specific, achievable steps using
the available tools, in order, with realistic time estimates.

Available tools:
{tools_desc}

Respond with JSON:
{{"goal": "...", "actions": [{{"tool_name": "...", "parameters": {{}}, "reasoning": "...", "expected_outcome": "..."}}], "estimated_time_secs": 0, "confidence": 0.0-1.0}}"#
        )
    }

    fn parse_plan(&self, content: &str) -> Result<ActionPlan, LlmError> {
        let json_str = extract_json(content).unwrap_or(content);
        serde_json::from_str(json_str)
            .map_err(|e| LlmError::InvalidResponse(format!("failed to parse plan: {}", e)))
    }

    fn parse_evaluation(&self, content: &str) -> Result<SuccessEvaluation, LlmError> {
        let json_str = extract_json(content).unwrap_or(content);
        serde_json::from_str(json_str)
            .map_err(|e| LlmError::InvalidResponse(format!("failed to parse evaluation: {}", e)))
    }
}

/// Result of success evaluation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuccessEvaluation {
    pub success: bool,
    pub confidence: f64,
    pub reasoning: String,
    #[serde(default)]
    pub issues: Vec<String>,
}

/// Extract JSON from text that might contain other content.
fn extract_json(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if start < end { Some(&text[start..=end]) } else { None }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_json() {
        let text = "Here's the plan:\n{\"goal\": \"test\", \"actions\": []}\nThat's my plan.";
        let json = extract_json(text).unwrap();
        assert!(json.starts_with('{'));
        assert!(json.ends_with('}'));
    }

    #[test]
    fn test_reasoning_context_builder() {
        let context = ReasoningContext::new("gpt-4o-mini")
            .with_message(ChatMessage::user("Hello"))
            .with_job("Test job");

        assert_eq!(context.messages.len(), 1);
        assert!(context.job_description.is_some());
    }
}
