// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Repository Implementations
//!
//! Infrastructure implementations of the task record repository defined in
//! the domain layer.
//!
//! - **InMemoryTaskRecordRepository** - process-lifetime storage for tests
//!   and embedded use
//! - **JsonFileTaskRecordRepository** - a single JSON array file, so records
//!   survive restarts

pub mod json_file;

pub use json_file::JsonFileTaskRecordRepository;

use async_trait::async_trait;
use parking_lot::RwLock;
use std::sync::Arc;

use crate::domain::task_record::{RepositoryError, TaskRecord, TaskRecordRepository};

#[derive(Clone, Default)]
pub struct InMemoryTaskRecordRepository {
    records: Arc<RwLock<Vec<TaskRecord>>>,
}

impl InMemoryTaskRecordRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TaskRecordRepository for InMemoryTaskRecordRepository {
    async fn append(&self, record: TaskRecord) -> Result<(), RepositoryError> {
        self.records.write().push(record);
        Ok(())
    }

    async fn list_all(&self) -> Result<Vec<TaskRecord>, RepositoryError> {
        Ok(self.records.read().clone())
    }

    async fn find_by_hash(&self, task_hash: &str) -> Result<Vec<TaskRecord>, RepositoryError> {
        let records = self.records.read();
        Ok(records
            .iter()
            .filter(|r| r.task_hash == task_hash)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_completion_requires_successful_record() {
        let repo = InMemoryTaskRecordRepository::new();
        repo.append(TaskRecord::failed("abc", "seed", "db down"))
            .await
            .unwrap();
        assert!(!repo.is_completed("abc").await.unwrap());

        repo.append(TaskRecord::completed("abc", "seed")).await.unwrap();
        assert!(repo.is_completed("abc").await.unwrap());
        assert_eq!(repo.find_by_hash("abc").await.unwrap().len(), 2);
        assert!(repo.find_by_hash("zzz").await.unwrap().is_empty());
    }
}
