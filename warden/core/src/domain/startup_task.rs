// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Startup Tasks
//!
//! A startup task is a scheduled job with a content-derived identity. The
//! `task_hash` lets a process tell, after a restart, whether a one-time task
//! already ran: two definitions with the same name, description and schedule
//! hash identically.
//!
//! A task built without any schedule runs "now". The hash is taken over the
//! fields as supplied, before that default is filled in, so a run-now task
//! keeps the same hash across restarts.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::domain::action::ActionError;
use crate::domain::invocation::Arguments;
use crate::domain::schedule::{Schedule, ScheduleConfigError};

const TASK_HASH_LEN: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskSpec {
    name: String,
    description: String,
    task_hash: String,
    created_at: DateTime<Utc>,
    schedule: Schedule,
    enabled: bool,
    /// No schedule was supplied; `schedule` holds the construction instant.
    run_now: bool,
}

impl TaskSpec {
    pub fn builder(name: impl Into<String>, description: impl Into<String>) -> TaskSpecBuilder {
        TaskSpecBuilder {
            name: name.into(),
            description: description.into(),
            execute_at: None,
            cron_expression: None,
            task_hash: None,
            enabled: true,
            created_at: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn task_hash(&self) -> &str {
        &self.task_hash
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn schedule(&self) -> &Schedule {
        &self.schedule
    }

    pub fn execute_at(&self) -> Option<DateTime<Utc>> {
        self.schedule.execute_at()
    }

    pub fn cron_expression(&self) -> Option<&str> {
        self.schedule.cron_expression()
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn is_recurring(&self) -> bool {
        self.schedule.is_recurring()
    }

    pub fn is_one_time(&self) -> bool {
        self.schedule.is_one_time()
    }

    pub fn should_execute_now(&self) -> bool {
        self.schedule.should_execute_now()
    }

    /// Recomputes the content hash from this task's definition.
    pub fn generate_hash(&self) -> String {
        let execute_at = if self.run_now {
            None
        } else {
            self.schedule.execute_at()
        };
        content_hash(
            &self.name,
            &self.description,
            execute_at,
            self.schedule.cron_expression(),
        )
    }
}

pub struct TaskSpecBuilder {
    name: String,
    description: String,
    execute_at: Option<DateTime<Utc>>,
    cron_expression: Option<String>,
    task_hash: Option<String>,
    enabled: bool,
    created_at: Option<DateTime<Utc>>,
}

impl TaskSpecBuilder {
    pub fn execute_at(mut self, at: DateTime<Utc>) -> Self {
        self.execute_at = Some(at);
        self
    }

    pub fn cron(mut self, expression: impl Into<String>) -> Self {
        self.cron_expression = Some(expression.into());
        self
    }

    /// Pins the identity instead of deriving it from content.
    pub fn task_hash(mut self, hash: impl Into<String>) -> Self {
        self.task_hash = Some(hash.into());
        self
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn created_at(mut self, at: DateTime<Utc>) -> Self {
        self.created_at = Some(at);
        self
    }

    pub fn build(self) -> Result<TaskSpec, ScheduleConfigError> {
        let now = Utc::now();
        let cron_expression = self.cron_expression.filter(|expr| !expr.trim().is_empty());

        let task_hash = match self.task_hash {
            Some(hash) => hash,
            None => content_hash(
                &self.name,
                &self.description,
                self.execute_at,
                cron_expression.as_deref(),
            ),
        };

        let run_now = cron_expression.is_none() && self.execute_at.is_none();
        let schedule = if run_now {
            Schedule::At(now)
        } else {
            Schedule::from_parts(cron_expression, self.execute_at)?
        };

        Ok(TaskSpec {
            name: self.name,
            description: self.description,
            task_hash,
            created_at: self.created_at.unwrap_or(now),
            schedule,
            enabled: self.enabled,
            run_now,
        })
    }
}

/// First 16 hex characters of the SHA-256 of the task's canonical JSON
/// form: compact separators, keys sorted, timestamps in RFC 3339 UTC with a
/// `Z` suffix, absent fields as `null`.
///
/// This byte form is fixed. Hashes taken over a differently formatted
/// document (spaced separators, offset-less timestamps) never match it, so a
/// task recorded under such a hash counts as not yet completed.
pub fn content_hash(
    name: &str,
    description: &str,
    execute_at: Option<DateTime<Utc>>,
    cron_expression: Option<&str>,
) -> String {
    let mut canonical: BTreeMap<&str, Value> = BTreeMap::new();
    canonical.insert("name", Value::from(name));
    canonical.insert("description", Value::from(description));
    canonical.insert(
        "execute_at",
        execute_at
            .map(|at| Value::from(at.to_rfc3339_opts(SecondsFormat::AutoSi, true)))
            .unwrap_or(Value::Null),
    );
    canonical.insert(
        "cron_expression",
        cron_expression.map(Value::from).unwrap_or(Value::Null),
    );

    // Serializing a BTreeMap of plain values cannot fail.
    let encoded = serde_json::to_vec(&canonical).unwrap_or_default();
    let digest = hex::encode(Sha256::digest(&encoded));
    digest[..TASK_HASH_LEN].to_string()
}

/// A unit of work run when the process starts.
///
/// `run` must be idempotent: a crash between running a task and recording its
/// completion causes it to run again.
#[async_trait]
pub trait StartupTask: Send + Sync {
    fn spec(&self) -> &TaskSpec;

    async fn run(&self, arguments: Arguments) -> Result<Value, ActionError>;

    fn name(&self) -> &str {
        self.spec().name()
    }

    fn task_hash(&self) -> &str {
        self.spec().task_hash()
    }

    fn is_recurring(&self) -> bool {
        self.spec().is_recurring()
    }

    fn is_one_time(&self) -> bool {
        self.spec().is_one_time()
    }

    fn should_execute_now(&self) -> bool {
        self.spec().should_execute_now()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn fixed_instant() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 9, 30, 0).unwrap()
    }

    #[test]
    fn test_hash_is_stable_for_equal_content() {
        let a = TaskSpec::builder("seed", "seed the index")
            .execute_at(fixed_instant())
            .build()
            .unwrap();
        let b = TaskSpec::builder("seed", "seed the index")
            .execute_at(fixed_instant())
            .build()
            .unwrap();
        assert_eq!(a.task_hash(), b.task_hash());
        assert_eq!(a.task_hash().len(), 16);
        assert!(a.task_hash().chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(a.generate_hash(), a.task_hash());
    }

    #[test]
    fn test_hash_byte_form_is_pinned() {
        assert_eq!(content_hash("warmup", "d", None, None), "d8543ac4945138f0");

        let at = DateTime::parse_from_rfc3339("2026-01-02T03:04:05Z")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(
            content_hash("digest", "daily digest", Some(at), Some("0 8 * * *")),
            "72b69d03dcc949f6"
        );
    }

    #[test]
    fn test_hash_changes_with_content() {
        let a = TaskSpec::builder("seed", "v1").cron("0 0 * * *").build().unwrap();
        let b = TaskSpec::builder("seed", "v2").cron("0 0 * * *").build().unwrap();
        let c = TaskSpec::builder("seed", "v1").cron("0 1 * * *").build().unwrap();
        assert_ne!(a.task_hash(), b.task_hash());
        assert_ne!(a.task_hash(), c.task_hash());
    }

    #[test]
    fn test_run_now_default_keeps_identity() {
        let first = TaskSpec::builder("warmup", "").build().unwrap();
        let second = TaskSpec::builder("warmup", "").build().unwrap();
        assert!(first.is_one_time());
        assert!(first.execute_at().is_some());
        assert!(first.should_execute_now());
        assert_eq!(first.task_hash(), second.task_hash());
        assert_eq!(first.generate_hash(), first.task_hash());
        assert_eq!(first.task_hash(), content_hash("warmup", "", None, None));
    }

    #[test]
    fn test_explicit_hash_wins() {
        let task = TaskSpec::builder("t", "").task_hash("pinned").build().unwrap();
        assert_eq!(task.task_hash(), "pinned");
        assert_ne!(task.generate_hash(), "pinned");
    }

    #[test]
    fn test_both_schedules_rejected() {
        let result = TaskSpec::builder("t", "")
            .cron("* * * * *")
            .execute_at(fixed_instant())
            .build();
        assert_eq!(result, Err(ScheduleConfigError::ConflictingSchedule));
    }
}
