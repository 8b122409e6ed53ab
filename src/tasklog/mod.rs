//! Task logging service (C4): an append-only structured event log for every long-running job.
//!
//! Every connector run and background job logs `start`/`progress`/`success`/`failure` through
//! this service rather than writing ad-hoc tracing spans, so the log survives process restarts
//! and can be queried by task name.

mod entry;

pub use entry::{TaskLogEntry, TaskStatus};

use deadpool_postgres::Pool;
use serde_json::Value;
use tracing::{info, warn};

use crate::error::StoreError;

pub struct TaskLog {
    pool: Pool,
}

impl TaskLog {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    pub async fn log_start(&self, task_name: &str, source: &str) -> Result<(), StoreError> {
        self.log(task_name, source, "start", TaskStatus::Running, Value::Null)
            .await
    }

    pub async fn log_progress(
        &self,
        task_name: &str,
        source: &str,
        stage: &str,
        metadata: Value,
    ) -> Result<(), StoreError> {
        self.log(task_name, source, stage, TaskStatus::Running, metadata)
            .await
    }

    pub async fn log_success(
        &self,
        task_name: &str,
        source: &str,
        metadata: Value,
    ) -> Result<(), StoreError> {
        self.log(task_name, source, "complete", TaskStatus::Success, metadata)
            .await
    }

    pub async fn log_failure(
        &self,
        task_name: &str,
        source: &str,
        error_class: &str,
        metadata: Value,
    ) -> Result<(), StoreError> {
        let mut metadata = metadata;
        if let Value::Object(ref mut map) = metadata {
            map.insert("error_class".to_string(), Value::String(error_class.to_string()));
        }
        self.log(task_name, source, "failed", TaskStatus::Failure, metadata)
            .await
    }

    async fn log(
        &self,
        task_name: &str,
        source: &str,
        stage: &str,
        status: TaskStatus,
        metadata: Value,
    ) -> Result<(), StoreError> {
        let entry = TaskLogEntry::new(task_name, source, stage, status, metadata);

        match status {
            TaskStatus::Failure => warn!(task = %task_name, %source, %stage, "task failed"),
            _ => info!(task = %task_name, %source, %stage, "task event"),
        }

        let client = self
            .pool
            .get()
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;
        client
            .execute(
                "INSERT INTO task_log (id, task_name, source, stage, status, metadata, created_at) \
                 VALUES ($1,$2,$3,$4,$5,$6,$7)",
                &[
                    &entry.id,
                    &entry.task_name,
                    &entry.source,
                    &entry.stage,
                    &status_str(entry.status),
                    &entry.metadata,
                    &entry.created_at,
                ],
            )
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;
        Ok(())
    }
}

fn status_str(status: TaskStatus) -> &'static str {
    match status {
        TaskStatus::Running => "running",
        TaskStatus::Success => "success",
        TaskStatus::Failure => "failure",
    }
}
