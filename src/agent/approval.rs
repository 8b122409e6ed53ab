//! Approval suspension for mutating tool calls.
//!
//! A tool call that requires approval doesn't execute inline; it suspends the turn, and the
//! agent loop resumes it later from a matching `Submission::ExecApproval`.

use std::collections::HashMap;
use std::sync::Mutex;

use serde_json::Value;
use uuid::Uuid;

use crate::tools::tool::{ToolError, ToolOutput};

#[derive(Debug, Clone)]
pub struct ApprovalRequest {
    pub id: Uuid,
    pub tool_name: String,
    pub description: String,
    pub parameters: Value,
}

/// The result of attempting to run a tool call: either it ran, it needs a human decision, or
/// it failed outright.
pub enum ToolOutcome {
    Success(ToolOutput),
    Suspended(ApprovalRequest),
    Failed(ToolError),
}

/// A tool call parked pending approval, kept around so `ExecApproval` can resume it.
pub struct PendingCall {
    pub tool_name: String,
    pub parameters: Value,
    /// The originating LLM tool-call id, so the eventual result lands on the right message.
    pub tool_call_id: String,
}

/// In-process store of suspended tool calls, keyed by approval request id.
///
/// One instance per `Agent`; approvals don't survive process restart, matching the turn-based
/// nature of a single chat session.
#[derive(Default)]
pub struct PendingApprovals {
    inner: Mutex<HashMap<Uuid, PendingCall>>,
}

impl PendingApprovals {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, id: Uuid, call: PendingCall) {
        self.inner.lock().expect("pending approvals lock poisoned").insert(id, call);
    }

    /// Remove and return the pending call, applying parameter edits if the approver supplied
    /// any, or `None` if no approval with this id is outstanding.
    pub fn take(&self, id: Uuid, edited_parameters: Option<Value>) -> Option<PendingCall> {
        let mut call = self
            .inner
            .lock()
            .expect("pending approvals lock poisoned")
            .remove(&id)?;
        if let Some(edited) = edited_parameters {
            call.parameters = edited;
        }
        Some(call)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn take_applies_parameter_edits() {
        let store = PendingApprovals::new();
        let id = Uuid::new_v4();
        store.insert(
            id,
            PendingCall {
                tool_name: "delete_linear_issue".to_string(),
                parameters: serde_json::json!({"issue_id": "ABC-1"}),
                tool_call_id: "call_1".to_string(),
            },
        );

        let resumed = store
            .take(id, Some(serde_json::json!({"issue_id": "ABC-2"})))
            .unwrap();
        assert_eq!(resumed.parameters["issue_id"], "ABC-2");
        assert!(store.take(id, None).is_none());
    }

    #[test]
    fn take_without_edits_preserves_parameters() {
        let store = PendingApprovals::new();
        let id = Uuid::new_v4();
        store.insert(
            id,
            PendingCall {
                tool_name: "delete_linear_issue".to_string(),
                parameters: serde_json::json!({"issue_id": "ABC-1"}),
                tool_call_id: "call_1".to_string(),
            },
        );
        let resumed = store.take(id, None).unwrap();
        assert_eq!(resumed.parameters["issue_id"], "ABC-1");
    }
}
