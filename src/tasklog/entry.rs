//! Structured task-log entries (C4).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Running,
    Success,
    Failure,
}

/// One append-only event in a task's lifecycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskLogEntry {
    pub id: Uuid,
    pub task_name: String,
    pub source: String,
    pub stage: String,
    pub status: TaskStatus,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl TaskLogEntry {
    pub fn new(
        task_name: impl Into<String>,
        source: impl Into<String>,
        stage: impl Into<String>,
        status: TaskStatus,
        metadata: serde_json::Value,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            task_name: task_name.into(),
            source: source.into(),
            stage: stage.into(),
            status,
            metadata,
            created_at: Utc::now(),
        }
    }
}
