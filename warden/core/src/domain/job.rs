// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Scheduled Jobs
//!
//! A scheduled job is an action plus a schedule. [`JobSpec`] holds the
//! scheduling metadata and is validated on construction; implementors of
//! [`ScheduledJob`] supply the body.

use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::action::ActionError;
use crate::domain::invocation::Arguments;
use crate::domain::schedule::{Schedule, ScheduleConfigError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobSpec {
    name: String,
    description: String,
    schedule: Schedule,
    enabled: bool,
    max_instances: u32,
}

impl JobSpec {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        cron_expression: Option<String>,
        execute_at: Option<DateTime<Utc>>,
    ) -> Result<Self, ScheduleConfigError> {
        Ok(Self {
            name: name.into(),
            description: description.into(),
            schedule: Schedule::from_parts(cron_expression, execute_at)?,
            enabled: true,
            max_instances: 1,
        })
    }

    pub fn recurring(
        name: impl Into<String>,
        description: impl Into<String>,
        cron_expression: impl Into<String>,
    ) -> Result<Self, ScheduleConfigError> {
        Self::new(name, description, Some(cron_expression.into()), None)
    }

    pub fn one_time(
        name: impl Into<String>,
        description: impl Into<String>,
        execute_at: DateTime<Utc>,
    ) -> Result<Self, ScheduleConfigError> {
        Self::new(name, description, None, Some(execute_at))
    }

    pub fn with_max_instances(mut self, max_instances: u32) -> Result<Self, ScheduleConfigError> {
        if max_instances == 0 {
            return Err(ScheduleConfigError::InvalidMaxInstances);
        }
        self.max_instances = max_instances;
        Ok(self)
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn schedule(&self) -> &Schedule {
        &self.schedule
    }

    pub fn cron_expression(&self) -> Option<&str> {
        self.schedule.cron_expression()
    }

    pub fn execute_at(&self) -> Option<DateTime<Utc>> {
        self.schedule.execute_at()
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn max_instances(&self) -> u32 {
        self.max_instances
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
}

impl fmt::Display for JobSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let schedule = match &self.schedule {
            Schedule::Cron(expr) => expr.clone(),
            Schedule::At(at) => at.to_rfc3339(),
        };
        write!(
            f,
            "ScheduledJob(name='{}', schedule='{}', enabled={})",
            self.name, schedule, self.enabled
        )
    }
}

/// A job the registry can drive.
///
/// `spec()` is read on every call, so an implementation holding its spec
/// behind a lock sees pause/resume immediately.
#[async_trait]
pub trait ScheduledJob: Send + Sync {
    fn spec(&self) -> JobSpec;

    async fn run(&self, arguments: Arguments) -> Result<Value, ActionError>;

    fn name(&self) -> String {
        self.spec().name().to_string()
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
    use chrono::Duration;
    use serde_json::json;

    struct Heartbeat {
        spec: JobSpec,
    }

    #[async_trait]
    impl ScheduledJob for Heartbeat {
        fn spec(&self) -> JobSpec {
            self.spec.clone()
        }

        async fn run(&self, _arguments: Arguments) -> Result<Value, ActionError> {
            Ok(json!("beat"))
        }
    }

    #[test]
    fn test_recurring_job() {
        let spec = JobSpec::recurring("hb", "heartbeat", "*/5 * * * *").unwrap();
        assert!(spec.is_recurring());
        assert!(!spec.is_one_time());
        assert!(!spec.should_execute_now());
        assert_eq!(spec.max_instances(), 1);
        assert!(spec.enabled());
    }

    #[test]
    fn test_one_time_job_due_in_past_not_in_future() {
        let past = JobSpec::one_time("p", "", Utc::now() - Duration::minutes(1)).unwrap();
        let future = JobSpec::one_time("f", "", Utc::now() + Duration::hours(1)).unwrap();
        assert!(past.should_execute_now());
        assert!(!future.should_execute_now());
    }

    #[test]
    fn test_construction_failures() {
        assert_eq!(
            JobSpec::new("x", "", None, None),
            Err(ScheduleConfigError::MissingSchedule)
        );
        assert_eq!(
            JobSpec::new("x", "", Some("* * * * *".into()), Some(Utc::now())),
            Err(ScheduleConfigError::ConflictingSchedule)
        );
        assert_eq!(
            JobSpec::recurring("x", "", "* * * * *")
                .unwrap()
                .with_max_instances(0),
            Err(ScheduleConfigError::InvalidMaxInstances)
        );
    }

    #[test]
    fn test_display() {
        let spec = JobSpec::recurring("hb", "", "0 9 * * *").unwrap().disabled();
        assert_eq!(
            spec.to_string(),
            "ScheduledJob(name='hb', schedule='0 9 * * *', enabled=false)"
        );
    }

    #[tokio::test]
    async fn test_trait_delegates_to_spec() {
        let job = Heartbeat {
            spec: JobSpec::recurring("hb", "", "* * * * *").unwrap(),
        };
        assert_eq!(job.name(), "hb");
        assert!(job.is_recurring());
        assert_eq!(job.run(Arguments::new()).await.unwrap(), json!("beat"));
    }
}
