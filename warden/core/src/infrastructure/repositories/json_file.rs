// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::debug;

use crate::domain::task_record::{RepositoryError, TaskRecord, TaskRecordRepository};

/// Task records stored as a pretty-printed JSON array.
///
/// The file and its parent directory are created on the first append. Writes
/// go to a sibling temp file that is then renamed over the original, so a
/// crash mid-write leaves the previous contents intact. A file that exists but
/// does not parse is reported as an error rather than treated as empty.
pub struct JsonFileTaskRecordRepository {
    path: PathBuf,
    // Serializes read-modify-write cycles within this process
    write_lock: Mutex<()>,
}

impl JsonFileTaskRecordRepository {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<Vec<TaskRecord>, RepositoryError> {
        let content = match tokio::fs::read(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        if content.iter().all(u8::is_ascii_whitespace) {
            return Ok(Vec::new());
        }
        serde_json::from_slice(&content).map_err(|e| {
            RepositoryError::Serialization(format!(
                "failed to parse task records at {:?}: {}",
                self.path, e
            ))
        })
    }

    async fn store(&self, records: &[TaskRecord]) -> Result<(), RepositoryError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let encoded = serde_json::to_vec_pretty(records)?;
        let tmp_path = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp_path, encoded).await?;
        tokio::fs::rename(&tmp_path, &self.path).await?;
        debug!("Stored {} task records at {:?}", records.len(), self.path);
        Ok(())
    }
}

#[async_trait]
impl TaskRecordRepository for JsonFileTaskRecordRepository {
    async fn append(&self, record: TaskRecord) -> Result<(), RepositoryError> {
        let _guard = self.write_lock.lock().await;
        let mut records = self.load().await?;
        records.push(record);
        self.store(&records).await
    }

    async fn list_all(&self) -> Result<Vec<TaskRecord>, RepositoryError> {
        let _guard = self.write_lock.lock().await;
        self.load().await
    }

    async fn find_by_hash(&self, task_hash: &str) -> Result<Vec<TaskRecord>, RepositoryError> {
        Ok(self
            .list_all()
            .await?
            .into_iter()
            .filter(|r| r.task_hash == task_hash)
            .collect())
    }
}
