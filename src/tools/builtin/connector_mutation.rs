//! Mutating connector tools. Unlike every other built-in tool these change state in a third
//! party system, so each one unconditionally requires approval before it runs.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::context::JobContext;
use crate::tools::tool::{Tool, ToolError, ToolOutput};

const LINEAR_API_URL: &str = "https://api.linear.app/graphql";

fn linear_token(config: &Value) -> Result<String, ToolError> {
    config
        .get("api_key")
        .or_else(|| config.get("access_token"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| ToolError::ExecutionFailed("connector is missing a Linear API token".to_string()))
}

async fn linear_graphql(client: &Client, token: &str, query: &str, variables: Value) -> Result<Value, ToolError> {
    let response = client
        .post(LINEAR_API_URL)
        .header("Authorization", token)
        .json(&json!({"query": query, "variables": variables}))
        .send()
        .await
        .map_err(|e| {
            if e.is_timeout() {
                ToolError::Timeout(Duration::from_secs(30))
            } else {
                ToolError::ExternalService(e.to_string())
            }
        })?;

    let body: Value = response
        .json()
        .await
        .map_err(|e| ToolError::ExternalService(format!("invalid Linear response: {e}")))?;

    if let Some(errors) = body.get("errors").and_then(Value::as_array) {
        if let Some(first) = errors.first() {
            let message = first.get("message").and_then(Value::as_str).unwrap_or("unknown Linear error");
            return Err(ToolError::ExternalService(message.to_string()));
        }
    }
    Ok(body)
}

/// Creates a new Linear issue. Always suspends for approval; the approver may edit the
/// title/description/team before the mutation actually runs.
pub struct CreateLinearIssueTool {
    connector_id: Uuid,
    client: Client,
}

impl CreateLinearIssueTool {
    pub fn new(connector_id: Uuid) -> Self {
        Self {
            connector_id,
            client: Client::builder().timeout(Duration::from_secs(30)).build().expect("static client config is valid"),
        }
    }
}

#[async_trait]
impl Tool for CreateLinearIssueTool {
    fn name(&self) -> &str {
        "create_linear_issue"
    }

    fn description(&self) -> &str {
        "Create a new issue in Linear. Use only when the user explicitly asks to create, add, \
         or file a new issue or ticket."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "team_id": {"type": "string", "description": "Linear team id the issue belongs to"},
                "title": {"type": "string", "description": "Short, descriptive issue title"},
                "description": {"type": "string", "description": "Optional markdown body for the issue"}
            },
            "required": ["team_id", "title"]
        })
    }

    async fn execute(&self, params: Value, ctx: &JobContext) -> Result<ToolOutput, ToolError> {
        let start = std::time::Instant::now();
        let title = params
            .get("title")
            .and_then(Value::as_str)
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| ToolError::InvalidParameters("issue title cannot be empty".to_string()))?;
        let team_id = params
            .get("team_id")
            .and_then(Value::as_str)
            .ok_or_else(|| ToolError::InvalidParameters("missing 'team_id' parameter".to_string()))?;
        let description = params.get("description").and_then(Value::as_str).unwrap_or_default();

        let connector = ctx
            .services
            .repository
            .get_connector(self.connector_id)
            .await
            .map_err(|e| ToolError::ExecutionFailed(e.to_string()))?;
        let token = linear_token(&connector.config)?;

        let body = linear_graphql(
            &self.client,
            &token,
            "mutation($input: IssueCreateInput!) { issueCreate(input: $input) { success issue { id identifier url } } }",
            json!({"input": {"teamId": team_id, "title": title, "description": description}}),
        )
        .await?;

        let issue = &body["data"]["issueCreate"]["issue"];
        let identifier = issue.get("identifier").and_then(Value::as_str).unwrap_or_default();
        let result = json!({
            "status": "success",
            "issue_id": issue.get("id"),
            "identifier": identifier,
            "url": issue.get("url"),
            "message": format!("Issue {identifier} created successfully."),
        });
        Ok(ToolOutput::success(result, start.elapsed()))
    }

    fn requires_approval(&self) -> bool {
        true
    }
}

/// Updates fields on an existing Linear issue.
pub struct UpdateLinearIssueTool {
    connector_id: Uuid,
    client: Client,
}

impl UpdateLinearIssueTool {
    pub fn new(connector_id: Uuid) -> Self {
        Self {
            connector_id,
            client: Client::builder().timeout(Duration::from_secs(30)).build().expect("static client config is valid"),
        }
    }
}

#[async_trait]
impl Tool for UpdateLinearIssueTool {
    fn name(&self) -> &str {
        "update_linear_issue"
    }

    fn description(&self) -> &str {
        "Update the title, description, or state of an existing Linear issue."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "issue_id": {"type": "string", "description": "The Linear issue id to update"},
                "title": {"type": "string"},
                "description": {"type": "string"},
                "state_id": {"type": "string", "description": "Workflow state id to move the issue to"}
            },
            "required": ["issue_id"]
        })
    }

    async fn execute(&self, params: Value, ctx: &JobContext) -> Result<ToolOutput, ToolError> {
        let start = std::time::Instant::now();
        let issue_id = params
            .get("issue_id")
            .and_then(Value::as_str)
            .ok_or_else(|| ToolError::InvalidParameters("missing 'issue_id' parameter".to_string()))?;

        let mut input = serde_json::Map::new();
        for field in ["title", "description", "state_id"] {
            if let Some(value) = params.get(field).and_then(Value::as_str) {
                let key = if field == "state_id" { "stateId" } else { field };
                input.insert(key.to_string(), Value::String(value.to_string()));
            }
        }
        if input.is_empty() {
            return Err(ToolError::InvalidParameters("no fields to update were provided".to_string()));
        }

        let connector = ctx
            .services
            .repository
            .get_connector(self.connector_id)
            .await
            .map_err(|e| ToolError::ExecutionFailed(e.to_string()))?;
        let token = linear_token(&connector.config)?;

        let body = linear_graphql(
            &self.client,
            &token,
            "mutation($id: String!, $input: IssueUpdateInput!) { issueUpdate(id: $id, input: $input) { success issue { identifier url } } }",
            json!({"id": issue_id, "input": Value::Object(input)}),
        )
        .await?;

        let issue = &body["data"]["issueUpdate"]["issue"];
        let identifier = issue.get("identifier").and_then(Value::as_str).unwrap_or_default();
        let result = json!({
            "status": "success",
            "identifier": identifier,
            "url": issue.get("url"),
            "message": format!("Issue {identifier} updated successfully."),
        });
        Ok(ToolOutput::success(result, start.elapsed()))
    }

    fn requires_approval(&self) -> bool {
        true
    }
}

/// Archives (Linear's equivalent of delete) an issue.
pub struct DeleteLinearIssueTool {
    connector_id: Uuid,
    client: Client,
}

impl DeleteLinearIssueTool {
    pub fn new(connector_id: Uuid) -> Self {
        Self {
            connector_id,
            client: Client::builder().timeout(Duration::from_secs(30)).build().expect("static client config is valid"),
        }
    }
}

#[async_trait]
impl Tool for DeleteLinearIssueTool {
    fn name(&self) -> &str {
        "delete_linear_issue"
    }

    fn description(&self) -> &str {
        "Archive (delete) a Linear issue. Linear archives rather than permanently deletes; \
         issues can be restored from the archive."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "issue_id": {"type": "string", "description": "The Linear issue id to archive"}
            },
            "required": ["issue_id"]
        })
    }

    async fn execute(&self, params: Value, ctx: &JobContext) -> Result<ToolOutput, ToolError> {
        let start = std::time::Instant::now();
        let issue_id = params
            .get("issue_id")
            .and_then(Value::as_str)
            .ok_or_else(|| ToolError::InvalidParameters("missing 'issue_id' parameter".to_string()))?;

        let connector = ctx
            .services
            .repository
            .get_connector(self.connector_id)
            .await
            .map_err(|e| match e {
                crate::error::StoreError::ConnectorNotFound { .. } => ToolError::NotFound("Linear connector".to_string()),
                other => ToolError::ExecutionFailed(other.to_string()),
            })?;
        let token = linear_token(&connector.config)?;

        let body = linear_graphql(
            &self.client,
            &token,
            "mutation($id: String!) { issueArchive(id: $id) { success } }",
            json!({"id": issue_id}),
        )
        .await?;

        let success = body["data"]["issueArchive"]["success"].as_bool().unwrap_or(false);
        if !success {
            return Err(ToolError::ExecutionFailed("Linear declined to archive the issue".to_string()));
        }

        let result = json!({
            "status": "success",
            "message": "Issue archived successfully.",
        });
        Ok(ToolOutput::success(result, start.elapsed()))
    }

    fn requires_approval(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn linear_token_reads_api_key_or_access_token() {
        assert_eq!(linear_token(&json!({"api_key": "abc"})).unwrap(), "abc");
        assert_eq!(linear_token(&json!({"access_token": "xyz"})).unwrap(), "xyz");
        assert!(linear_token(&json!({})).is_err());
    }

    #[test]
    fn all_mutation_tools_require_approval() {
        let id = Uuid::new_v4();
        assert!(CreateLinearIssueTool::new(id).requires_approval());
        assert!(UpdateLinearIssueTool::new(id).requires_approval());
        assert!(DeleteLinearIssueTool::new(id).requires_approval());
    }
}
