//! The turn-based agent loop: drives the LLM, dispatches tool calls, and suspends on the ones
//! that require human approval.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use serde_json::Value;
use uuid::Uuid;

use super::approval::{ApprovalRequest, PendingApprovals, PendingCall, ToolOutcome};
use super::citation::invalid_citations;
use super::submission::{Submission, SubmissionResult};
use super::system_prompt::build_system_prompt;
use crate::config::Services;
use crate::context::JobContext;
use crate::error::AgentError;
use crate::llm::{ChatMessage, ChatRole, CompletionRequest, CompletionResponse, ToolCall, ToolCompletionRequest, ToolDefinition};
use crate::tools::tool::Tool;

enum DrainOutcome {
    Continue,
    Suspended(SubmissionResult),
}

/// One chat session: history, the tool set it was constructed with, and any approval
/// suspended mid-turn. Not `Send`-shared across turns — one caller drives it sequentially.
pub struct Agent {
    user_id: String,
    search_space_id: Uuid,
    services: Arc<Services>,
    model: String,
    tools: Vec<Arc<dyn Tool>>,
    history: Vec<ChatMessage>,
    queued_calls: VecDeque<ToolCall>,
    pending_approvals: PendingApprovals,
    turn_citation_ids: HashSet<u64>,
    citations_enabled: bool,
}

impl Agent {
    pub fn new(
        user_id: impl Into<String>,
        search_space_id: Uuid,
        services: Arc<Services>,
        tools: Vec<Arc<dyn Tool>>,
        user_instructions: Option<&str>,
    ) -> Self {
        let model = services.config.llm_model.clone();
        let citations_enabled = services.config.citations_enabled;
        let system_prompt = build_system_prompt(user_instructions, citations_enabled);

        Self {
            user_id: user_id.into(),
            search_space_id,
            services,
            model,
            tools,
            history: vec![ChatMessage::system(system_prompt)],
            queued_calls: VecDeque::new(),
            pending_approvals: PendingApprovals::new(),
            turn_citation_ids: HashSet::new(),
            citations_enabled,
        }
    }

    pub async fn submit(&mut self, submission: Submission) -> Result<SubmissionResult, AgentError> {
        match submission {
            Submission::UserInput { content } => {
                self.history.push(ChatMessage::user(content));
                self.turn_citation_ids.clear();
                self.continue_turn().await
            }

            Submission::ExecApproval {
                request_id,
                approved,
                always,
            } => {
                if always {
                    tracing::debug!(tool_name = %request_id, "always-approve noted; this runtime re-asks next time a matching tool call suspends");
                }
                let Some(pending) = self.pending_approvals.take(request_id, None) else {
                    return Ok(SubmissionResult::error(format!(
                        "no pending approval with id {request_id}"
                    )));
                };
                self.resolve_approval(pending, approved).await?;
                self.continue_turn().await
            }

            Submission::Interrupt => Ok(SubmissionResult::Interrupted),

            Submission::Compact => {
                self.compact_history();
                Ok(SubmissionResult::ok_with_message("history compacted"))
            }

            Submission::Clear | Submission::NewThread => {
                self.reset_history();
                Ok(SubmissionResult::ok())
            }

            Submission::Undo | Submission::Redo | Submission::Resume { .. } | Submission::SwitchThread { .. } => {
                Ok(SubmissionResult::error("not supported by this agent runtime"))
            }
        }
    }

    async fn resolve_approval(&mut self, pending: PendingCall, approved: bool) -> Result<(), AgentError> {
        if !approved {
            self.history.push(tool_message(&pending.tool_call_id, &serde_json::json!({"status": "rejected"})));
            self.history.push(ChatMessage::system(format!(
                "The user rejected the {} tool call. Acknowledge briefly and do not retry it.",
                pending.tool_name
            )));
            return Ok(());
        }

        let Some(tool) = self.find_tool(&pending.tool_name) else {
            self.history.push(tool_message(
                &pending.tool_call_id,
                &serde_json::json!({"error": format!("tool {} is no longer registered", pending.tool_name)}),
            ));
            return Ok(());
        };

        let ctx = self.job_context();
        match tool.execute(pending.parameters.clone(), &ctx).await {
            Ok(output) => {
                self.record_citations(&output.value);
                self.history.push(tool_message(&pending.tool_call_id, &output.value));
            }
            Err(err) => {
                self.history.push(tool_message(
                    &pending.tool_call_id,
                    &serde_json::json!({"error": err.to_string()}),
                ));
            }
        }
        Ok(())
    }

    async fn continue_turn(&mut self) -> Result<SubmissionResult, AgentError> {
        loop {
            if let DrainOutcome::Suspended(result) = self.drain_queue().await? {
                return Ok(result);
            }

            let response = self.call_llm().await?;
            self.history.push(ChatMessage::assistant(response.content.clone()));

            if response.tool_calls.is_empty() {
                self.check_citations(&response.content);
                return Ok(SubmissionResult::response(response.content));
            }
            self.queued_calls.extend(response.tool_calls);
        }
    }

    /// Executes queued tool calls in emission order until one suspends for approval or the
    /// queue drains.
    async fn drain_queue(&mut self) -> Result<DrainOutcome, AgentError> {
        while let Some(call) = self.queued_calls.pop_front() {
            let Some(tool) = self.find_tool(&call.name) else {
                self.history.push(tool_message(
                    &call.id,
                    &serde_json::json!({"error": format!("unknown tool {}", call.name)}),
                ));
                continue;
            };

            match self.invoke_tool(&tool, &call).await {
                ToolOutcome::Success(output) => {
                    self.record_citations(&output.value);
                    self.history.push(tool_message(&call.id, &output.value));
                }
                ToolOutcome::Suspended(request) => {
                    self.pending_approvals.insert(
                        request.id,
                        PendingCall {
                            tool_name: request.tool_name.clone(),
                            parameters: request.parameters.clone(),
                            tool_call_id: call.id.clone(),
                        },
                    );
                    return Ok(DrainOutcome::Suspended(SubmissionResult::NeedApproval {
                        request_id: request.id,
                        tool_name: request.tool_name,
                        description: request.description,
                        parameters: request.parameters,
                    }));
                }
                ToolOutcome::Failed(err) => {
                    self.history.push(tool_message(&call.id, &serde_json::json!({"error": err.to_string()})));
                }
            }
        }
        Ok(DrainOutcome::Continue)
    }

    async fn invoke_tool(&self, tool: &Arc<dyn Tool>, call: &ToolCall) -> ToolOutcome {
        if tool.requires_approval() {
            return ToolOutcome::Suspended(ApprovalRequest {
                id: Uuid::new_v4(),
                tool_name: tool.name().to_string(),
                description: format!("{} requested with parameters {}", tool.name(), call.arguments),
                parameters: call.arguments.clone(),
            });
        }

        let ctx = self.job_context();
        match tool.execute(call.arguments.clone(), &ctx).await {
            Ok(output) => ToolOutcome::Success(output),
            Err(err) => ToolOutcome::Failed(err),
        }
    }

    async fn call_llm(&self) -> Result<CompletionResponse, AgentError> {
        let tools = self
            .tools
            .iter()
            .map(|t| ToolDefinition {
                name: t.name().to_string(),
                description: t.description().to_string(),
                parameters_schema: t.parameters_schema(),
            })
            .collect();

        let request = ToolCompletionRequest {
            base: CompletionRequest {
                model: self.model.clone(),
                messages: self.history.clone(),
                temperature: Some(0.3),
                max_tokens: Some(2048),
            },
            tools,
        };
        Ok(self.services.llm.complete_with_tools(request).await?)
    }

    fn check_citations(&self, content: &str) {
        if !self.citations_enabled {
            return;
        }
        let invalid = invalid_citations(content, &self.turn_citation_ids);
        if !invalid.is_empty() {
            tracing::warn!(?invalid, "model cited ids outside this turn's retrieval context");
        }
    }

    fn record_citations(&mut self, value: &Value) {
        let Some(chunks) = value.get("citable_chunks").and_then(Value::as_array) else {
            return;
        };
        for chunk in chunks {
            if let Some(id) = chunk.get("chunk_id").and_then(Value::as_u64) {
                self.turn_citation_ids.insert(id);
            }
        }
    }

    fn find_tool(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.iter().find(|t| t.name() == name).cloned()
    }

    fn job_context(&self) -> JobContext {
        JobContext::new(self.user_id.clone(), self.search_space_id, self.services.clone())
    }

    fn compact_history(&mut self) {
        const KEEP_RECENT: usize = 20;
        if self.history.len() <= KEEP_RECENT + 1 {
            return;
        }
        let system = self.history[0].clone();
        let tail = self.history.split_off(self.history.len() - KEEP_RECENT);
        self.history = vec![system];
        self.history.extend(tail);
    }

    fn reset_history(&mut self) {
        let system = self.history.first().cloned();
        self.history.clear();
        if let Some(system) = system {
            self.history.push(system);
        }
        self.queued_calls.clear();
    }
}

fn tool_message(call_id: &str, value: &Value) -> ChatMessage {
    ChatMessage {
        role: ChatRole::Tool,
        content: value.to_string(),
        tool_call_id: Some(call_id.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::error::{LlmError, ToolError};
    use crate::llm::{CompletionResponse, LlmProvider, LlmRouter};
    use crate::tasklog::TaskLog;
    use crate::tools::tool::ToolOutput;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::time::Duration;

    struct ScriptedLlm {
        responses: Mutex<VecDeque<CompletionResponse>>,
    }

    #[async_trait]
    impl LlmProvider for ScriptedLlm {
        fn handles(&self, _model: &str) -> bool {
            true
        }

        async fn complete(&self, _request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
            Ok(CompletionResponse { content: "ok".to_string(), tool_calls: vec![] })
        }

        async fn complete_with_tools(
            &self,
            _request: ToolCompletionRequest,
        ) -> Result<CompletionResponse, LlmError> {
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| LlmError::Request("script exhausted".to_string()))
        }
    }

    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }
        fn description(&self) -> &str {
            "echoes its input"
        }
        fn parameters_schema(&self) -> Value {
            serde_json::json!({"type": "object"})
        }
        async fn execute(&self, params: Value, _ctx: &JobContext) -> Result<ToolOutput, ToolError> {
            Ok(ToolOutput::success(params, Duration::from_millis(1)))
        }
    }

    struct MutatingTool;

    #[async_trait]
    impl Tool for MutatingTool {
        fn name(&self) -> &str {
            "delete_thing"
        }
        fn description(&self) -> &str {
            "deletes a thing"
        }
        fn parameters_schema(&self) -> Value {
            serde_json::json!({"type": "object"})
        }
        async fn execute(&self, _params: Value, _ctx: &JobContext) -> Result<ToolOutput, ToolError> {
            Ok(ToolOutput::success(serde_json::json!({"deleted": true}), Duration::from_millis(1)))
        }
        fn requires_approval(&self) -> bool {
            true
        }
    }

    struct NoopEmbeddings;

    #[async_trait]
    impl crate::embedding::EmbeddingProvider for NoopEmbeddings {
        fn dimensions(&self) -> usize {
            8
        }
        async fn embed(&self, _text: &str) -> Result<Vec<f32>, crate::error::EmbeddingError> {
            Ok(vec![0.0; 8])
        }
    }

    fn test_pool() -> deadpool_postgres::Pool {
        deadpool_postgres::Pool::builder(deadpool_postgres::Manager::new(
            tokio_postgres::Config::new(),
            tokio_postgres::NoTls,
        ))
        .build()
        .unwrap()
    }

    fn test_services(llm: ScriptedLlm) -> Arc<Services> {
        Arc::new(Services {
            config: Arc::new(AppConfig::default()),
            repository: Arc::new(crate::store::Repository::new(test_pool())),
            llm: Arc::new(LlmRouter::new("test-model").register(Arc::new(llm))),
            embeddings: Arc::new(NoopEmbeddings),
            tasklog: Arc::new(TaskLog::new(test_pool())),
        })
    }

    #[tokio::test]
    async fn plain_turn_returns_final_assistant_text() {
        let llm = ScriptedLlm {
            responses: Mutex::new(VecDeque::from([CompletionResponse {
                content: "hello there".to_string(),
                tool_calls: vec![],
            }])),
        };
        let services = test_services(llm);
        let mut agent = Agent::new("user-1", Uuid::new_v4(), services, vec![], None);

        let result = agent.submit(Submission::user_input("hi")).await.unwrap();
        match result {
            SubmissionResult::Response { content } => assert_eq!(content, "hello there"),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn tool_call_executes_and_drives_a_second_completion() {
        let llm = ScriptedLlm {
            responses: Mutex::new(VecDeque::from([
                CompletionResponse {
                    content: String::new(),
                    tool_calls: vec![ToolCall {
                        id: "call_1".to_string(),
                        name: "echo".to_string(),
                        arguments: serde_json::json!({"x": 1}),
                    }],
                },
                CompletionResponse {
                    content: "done".to_string(),
                    tool_calls: vec![],
                },
            ])),
        };
        let services = test_services(llm);
        let mut agent = Agent::new("user-1", Uuid::new_v4(), services, vec![Arc::new(EchoTool)], None);

        let result = agent.submit(Submission::user_input("run echo")).await.unwrap();
        assert!(matches!(result, SubmissionResult::Response { content } if content == "done"));
    }

    #[tokio::test]
    async fn mutating_tool_suspends_and_resumes_on_approval() {
        let llm = ScriptedLlm {
            responses: Mutex::new(VecDeque::from([
                CompletionResponse {
                    content: String::new(),
                    tool_calls: vec![ToolCall {
                        id: "call_1".to_string(),
                        name: "delete_thing".to_string(),
                        arguments: serde_json::json!({}),
                    }],
                },
                CompletionResponse {
                    content: "deleted it".to_string(),
                    tool_calls: vec![],
                },
            ])),
        };
        let services = test_services(llm);
        let mut agent = Agent::new("user-1", Uuid::new_v4(), services, vec![Arc::new(MutatingTool)], None);

        let result = agent.submit(Submission::user_input("delete it")).await.unwrap();
        let request_id = match result {
            SubmissionResult::NeedApproval { request_id, tool_name, .. } => {
                assert_eq!(tool_name, "delete_thing");
                request_id
            }
            other => panic!("expected NeedApproval, got {other:?}"),
        };

        let result = agent.submit(Submission::approval(request_id, true)).await.unwrap();
        assert!(matches!(result, SubmissionResult::Response { content } if content == "deleted it"));
    }

    #[tokio::test]
    async fn rejected_tool_call_short_circuits_without_retrying() {
        let llm = ScriptedLlm {
            responses: Mutex::new(VecDeque::from([
                CompletionResponse {
                    content: String::new(),
                    tool_calls: vec![ToolCall {
                        id: "call_1".to_string(),
                        name: "delete_thing".to_string(),
                        arguments: serde_json::json!({}),
                    }],
                },
                CompletionResponse {
                    content: "okay, not deleting".to_string(),
                    tool_calls: vec![],
                },
            ])),
        };
        let services = test_services(llm);
        let mut agent = Agent::new("user-1", Uuid::new_v4(), services, vec![Arc::new(MutatingTool)], None);

        let result = agent.submit(Submission::user_input("delete it")).await.unwrap();
        let request_id = match result {
            SubmissionResult::NeedApproval { request_id, .. } => request_id,
            other => panic!("expected NeedApproval, got {other:?}"),
        };

        let result = agent.submit(Submission::approval(request_id, false)).await.unwrap();
        assert!(matches!(result, SubmissionResult::Response { content } if content == "okay, not deleting"));
    }
}
