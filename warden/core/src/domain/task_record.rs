// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Startup Task Records
//!
//! Execution history of startup tasks, keyed by `task_hash`. This is the only
//! state that survives a restart: it is how the manager knows a one-time task
//! already ran.
//!
//! | Implementation | Location |
//! |----------------|----------|
//! | `InMemoryTaskRecordRepository` | `crate::infrastructure::repositories` |
//! | `JsonFileTaskRecordRepository` | `crate::infrastructure::repositories::json_file` |

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskRunStatus {
    Completed,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRecord {
    pub task_hash: String,
    pub name: String,
    pub executed_at: DateTime<Utc>,
    pub status: TaskRunStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TaskRecord {
    pub fn completed(task_hash: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            task_hash: task_hash.into(),
            name: name.into(),
            executed_at: Utc::now(),
            status: TaskRunStatus::Completed,
            error: None,
        }
    }

    pub fn failed(
        task_hash: impl Into<String>,
        name: impl Into<String>,
        error: impl Into<String>,
    ) -> Self {
        Self {
            task_hash: task_hash.into(),
            name: name.into(),
            executed_at: Utc::now(),
            status: TaskRunStatus::Failed,
            error: Some(error.into()),
        }
    }
}

/// Repository errors
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<std::io::Error> for RepositoryError {
    fn from(err: std::io::Error) -> Self {
        RepositoryError::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for RepositoryError {
    fn from(err: serde_json::Error) -> Self {
        RepositoryError::Serialization(err.to_string())
    }
}

#[async_trait]
pub trait TaskRecordRepository: Send + Sync {
    /// Append one execution record
    async fn append(&self, record: TaskRecord) -> Result<(), RepositoryError>;

    /// All records, oldest first
    async fn list_all(&self) -> Result<Vec<TaskRecord>, RepositoryError>;

    /// Records for one task hash, oldest first
    async fn find_by_hash(&self, task_hash: &str) -> Result<Vec<TaskRecord>, RepositoryError>;

    /// Whether the task has at least one successful run on record
    async fn is_completed(&self, task_hash: &str) -> Result<bool, RepositoryError> {
        Ok(self
            .find_by_hash(task_hash)
            .await?
            .iter()
            .any(|record| record.status == TaskRunStatus::Completed))
    }
}
