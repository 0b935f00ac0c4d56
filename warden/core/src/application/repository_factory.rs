// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Repository Factory
//!
//! Picks the task record store from configuration so the domain layer only
//! ever sees the [`TaskRecordRepository`] trait.

use std::sync::Arc;

use tracing::info;

use crate::domain::config::StartupTasksConfig;
use crate::domain::task_record::TaskRecordRepository;
use crate::infrastructure::repositories::{
    InMemoryTaskRecordRepository, JsonFileTaskRecordRepository,
};

/// Creates the task record store described by `config`: a JSON file when
/// `records_file` is set, otherwise an in-memory store.
pub fn create_task_record_repository(
    config: &StartupTasksConfig,
) -> Arc<dyn TaskRecordRepository> {
    match &config.records_file {
        Some(path) => {
            info!("Persisting startup task records to {:?}", path);
            Arc::new(JsonFileTaskRecordRepository::new(path))
        }
        None => {
            info!("Keeping startup task records in memory");
            Arc::new(InMemoryTaskRecordRepository::new())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::task_record::TaskRecord;

    #[tokio::test]
    async fn test_records_file_selects_json_store() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("records.json");
        let config = StartupTasksConfig {
            records_file: Some(path.clone()),
        };

        let repository = create_task_record_repository(&config);
        repository
            .append(TaskRecord::completed("abc123", "seed"))
            .await
            .unwrap();
        assert!(path.exists());

        let reopened = create_task_record_repository(&config);
        assert!(reopened.is_completed("abc123").await.unwrap());
    }

    #[tokio::test]
    async fn test_unset_records_file_selects_memory_store() {
        let config = StartupTasksConfig { records_file: None };

        let repository = create_task_record_repository(&config);
        repository
            .append(TaskRecord::completed("abc123", "seed"))
            .await
            .unwrap();
        assert!(repository.is_completed("abc123").await.unwrap());

        let fresh = create_task_record_repository(&config);
        assert!(fresh.list_all().await.unwrap().is_empty());
    }
}
