// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Startup Task Manager
//!
//! Runs registered [`StartupTask`]s when the process starts and remembers,
//! through a [`TaskRecordRepository`], which one-time tasks already
//! completed.
//!
//! A task is pending when it is enabled and either recurring, or one-time,
//! due, and without a `Completed` record. Pending tasks run sequentially in
//! registration order:
//!
//! - a one-time success appends a `Completed` record;
//! - any failure, a panic included, appends a `Failed` record, which does not
//!   prevent a retry on the next start;
//! - a recurring success is handed to the [`JobRegistry`] as
//!   `startup_task_<name>` so the external scheduler keeps firing it.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use futures::FutureExt;
use parking_lot::RwLock;
use serde_json::Value;
use tracing::{error, info, warn};

use crate::application::job_registry::JobRegistry;
use crate::domain::action::ActionError;
use crate::domain::events::JobEvent;
use crate::domain::invocation::Arguments;
use crate::domain::job::{JobSpec, ScheduledJob};
use crate::domain::schedule::ScheduleConfigError;
use crate::domain::service::panic_message;
use crate::domain::startup_task::StartupTask;
use crate::domain::task_record::{RepositoryError, TaskRecord, TaskRecordRepository};
use crate::infrastructure::event_bus::EventBus;

/// Adapts a recurring startup task into a registry job.
pub struct StartupTaskJob {
    task: Arc<dyn StartupTask>,
    spec: JobSpec,
}

impl StartupTaskJob {
    pub fn new(task: Arc<dyn StartupTask>) -> Result<Self, ScheduleConfigError> {
        let cron = task
            .spec()
            .cron_expression()
            .ok_or(ScheduleConfigError::MissingSchedule)?
            .to_string();
        let spec = JobSpec::recurring(
            job_name_for(task.name()),
            format!(
                "Recurring execution of startup task: {}",
                task.spec().description()
            ),
            cron,
        )?;
        let spec = if task.spec().enabled() {
            spec
        } else {
            spec.disabled()
        };
        Ok(Self { task, spec })
    }

    pub fn task(&self) -> &Arc<dyn StartupTask> {
        &self.task
    }
}

#[async_trait]
impl ScheduledJob for StartupTaskJob {
    fn spec(&self) -> JobSpec {
        self.spec.clone()
    }

    async fn run(&self, arguments: Arguments) -> Result<Value, ActionError> {
        self.task.run(arguments).await
    }
}

pub fn job_name_for(task_name: &str) -> String {
    format!("startup_task_{}", task_name)
}

/// What one `execute_pending_tasks` pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StartupRunSummary {
    pub completed: Vec<String>,
    pub failed: Vec<String>,
    pub scheduled: Vec<String>,
}

impl StartupRunSummary {
    pub fn executed(&self) -> usize {
        self.completed.len() + self.failed.len()
    }
}

pub struct StartupTaskManager {
    tasks: RwLock<Vec<Arc<dyn StartupTask>>>,
    records: Arc<dyn TaskRecordRepository>,
    registry: Option<Arc<JobRegistry>>,
    event_bus: Option<EventBus>,
}

impl StartupTaskManager {
    pub fn new(records: Arc<dyn TaskRecordRepository>) -> Self {
        Self {
            tasks: RwLock::new(Vec::new()),
            records,
            registry: None,
            event_bus: None,
        }
    }

    pub fn with_job_registry(mut self, registry: Arc<JobRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn with_event_bus(mut self, event_bus: EventBus) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    /// Adds a task. A task with the same hash replaces the earlier one in
    /// place.
    pub fn register(&self, task: Arc<dyn StartupTask>) {
        let mut tasks = self.tasks.write();
        match tasks
            .iter_mut()
            .find(|existing| existing.task_hash() == task.task_hash())
        {
            Some(slot) => {
                warn!(
                    task = %task.name(),
                    task_hash = %task.task_hash(),
                    "Replacing startup task with identical hash"
                );
                *slot = task;
            }
            None => {
                info!(task = %task.name(), task_hash = %task.task_hash(), "Registered startup task");
                tasks.push(task);
            }
        }
    }

    pub fn tasks(&self) -> Vec<Arc<dyn StartupTask>> {
        self.tasks.read().clone()
    }

    pub async fn is_task_completed(&self, task_hash: &str) -> Result<bool, RepositoryError> {
        self.records.is_completed(task_hash).await
    }

    pub async fn pending_tasks(&self) -> Result<Vec<Arc<dyn StartupTask>>, RepositoryError> {
        let mut pending = Vec::new();
        for task in self.tasks() {
            if !task.spec().enabled() {
                continue;
            }
            if task.is_recurring() {
                pending.push(task);
            } else if task.should_execute_now() && !self.is_task_completed(task.task_hash()).await? {
                pending.push(task);
            }
        }
        Ok(pending)
    }

    pub async fn execute_pending_tasks(&self) -> Result<StartupRunSummary, RepositoryError> {
        let pending = self.pending_tasks().await?;
        let mut summary = StartupRunSummary::default();

        if pending.is_empty() {
            info!("No pending startup tasks to execute");
            return Ok(summary);
        }
        info!("Executing {} pending startup tasks", pending.len());

        for task in pending {
            self.execute_task(task, &mut summary).await?;
        }
        Ok(summary)
    }

    async fn execute_task(
        &self,
        task: Arc<dyn StartupTask>,
        summary: &mut StartupRunSummary,
    ) -> Result<(), RepositoryError> {
        let name = task.name().to_string();
        let task_hash = task.task_hash().to_string();
        info!(task = %name, "Executing startup task");

        let outcome = AssertUnwindSafe(task.run(Arguments::new()))
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| {
                Err(ActionError::failed(format!(
                    "task panicked: {}",
                    panic_message(panic.as_ref())
                )))
            });

        match outcome {
            Ok(_) => {
                if task.is_one_time() {
                    self.records
                        .append(TaskRecord::completed(&task_hash, &name))
                        .await?;
                    self.publish_recorded(&name, &task_hash, true);
                    info!(task = %name, "Startup task completed successfully");
                }
                summary.completed.push(name.clone());

                if task.is_recurring() {
                    self.schedule_recurring(task, &name, summary);
                }
            }
            Err(e) => {
                error!(task = %name, error = %e, "Startup task failed");
                self.records
                    .append(TaskRecord::failed(&task_hash, &name, e.to_string()))
                    .await?;
                self.publish_recorded(&name, &task_hash, false);
                summary.failed.push(name);
            }
        }
        Ok(())
    }

    fn schedule_recurring(
        &self,
        task: Arc<dyn StartupTask>,
        name: &str,
        summary: &mut StartupRunSummary,
    ) {
        let Some(registry) = &self.registry else {
            return;
        };
        match StartupTaskJob::new(task) {
            Ok(job) => {
                let job_name = job.spec.name().to_string();
                registry.register(Arc::new(job));
                info!(task = %name, job = %job_name, "Scheduled recurring startup task");
                summary.scheduled.push(job_name);
            }
            Err(e) => warn!(task = %name, error = %e, "Could not schedule recurring startup task"),
        }
    }

    fn publish_recorded(&self, name: &str, task_hash: &str, succeeded: bool) {
        if let Some(event_bus) = &self.event_bus {
            event_bus.publish_job_event(JobEvent::StartupTaskRecorded {
                task_name: name.to_string(),
                task_hash: task_hash.to_string(),
                succeeded,
                recorded_at: Utc::now(),
            });
        }
    }

    /// Every execution record on file, oldest first.
    pub async fn completed_records(&self) -> Result<Vec<TaskRecord>, RepositoryError> {
        self.records.list_all().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::startup_task::TaskSpec;
    use crate::infrastructure::repositories::InMemoryTaskRecordRepository;
    use serde_json::json;

    struct NoopTask {
        spec: TaskSpec,
    }

    #[async_trait]
    impl StartupTask for NoopTask {
        fn spec(&self) -> &TaskSpec {
            &self.spec
        }

        async fn run(&self, _arguments: Arguments) -> Result<Value, ActionError> {
            Ok(json!(null))
        }
    }

    #[test]
    fn test_startup_task_job_wraps_recurring_task() {
        let task: Arc<dyn StartupTask> = Arc::new(NoopTask {
            spec: TaskSpec::builder("digest", "daily digest")
                .cron("0 8 * * *")
                .build()
                .unwrap(),
        });
        let job = StartupTaskJob::new(task).unwrap();
        let spec = ScheduledJob::spec(&job);
        assert_eq!(spec.name(), "startup_task_digest");
        assert_eq!(
            spec.description(),
            "Recurring execution of startup task: daily digest"
        );
        assert_eq!(spec.cron_expression(), Some("0 8 * * *"));
        assert_eq!(spec.max_instances(), 1);
    }

    #[test]
    fn test_one_time_task_cannot_become_job() {
        let task: Arc<dyn StartupTask> = Arc::new(NoopTask {
            spec: TaskSpec::builder("once", "").build().unwrap(),
        });
        assert!(matches!(
            StartupTaskJob::new(task),
            Err(ScheduleConfigError::MissingSchedule)
        ));
    }

    #[tokio::test]
    async fn test_register_replaces_same_hash() {
        let manager = StartupTaskManager::new(Arc::new(InMemoryTaskRecordRepository::new()));
        for _ in 0..2 {
            manager.register(Arc::new(NoopTask {
                spec: TaskSpec::builder("warmup", "").build().unwrap(),
            }));
        }
        assert_eq!(manager.tasks().len(), 1);
    }
}
