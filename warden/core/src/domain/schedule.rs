// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ScheduleConfigError {
    #[error("Either cron_expression or execute_at must be provided")]
    MissingSchedule,

    #[error("Only one of cron_expression or execute_at should be provided")]
    ConflictingSchedule,

    #[error("max_instances must be at least 1")]
    InvalidMaxInstances,
}

/// When a job or task runs: a recurrence rule evaluated by an external
/// scheduler, or a single fixed instant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Schedule {
    Cron(String),
    At(DateTime<Utc>),
}

impl Schedule {
    /// Builds a schedule from the two optional fields, requiring exactly one.
    /// A blank cron expression counts as absent.
    pub fn from_parts(
        cron_expression: Option<String>,
        execute_at: Option<DateTime<Utc>>,
    ) -> Result<Self, ScheduleConfigError> {
        let cron_expression = cron_expression.filter(|expr| !expr.trim().is_empty());
        match (cron_expression, execute_at) {
            (Some(expr), None) => Ok(Schedule::Cron(expr)),
            (None, Some(at)) => Ok(Schedule::At(at)),
            (Some(_), Some(_)) => Err(ScheduleConfigError::ConflictingSchedule),
            (None, None) => Err(ScheduleConfigError::MissingSchedule),
        }
    }

    pub fn cron_expression(&self) -> Option<&str> {
        match self {
            Schedule::Cron(expr) => Some(expr),
            Schedule::At(_) => None,
        }
    }

    pub fn execute_at(&self) -> Option<DateTime<Utc>> {
        match self {
            Schedule::Cron(_) => None,
            Schedule::At(at) => Some(*at),
        }
    }

    pub fn is_recurring(&self) -> bool {
        matches!(self, Schedule::Cron(_))
    }

    pub fn is_one_time(&self) -> bool {
        matches!(self, Schedule::At(_))
    }

    /// Recurring schedules are never "due" here; cron evaluation belongs to
    /// the external scheduler.
    pub fn is_due_at(&self, now: DateTime<Utc>) -> bool {
        match self {
            Schedule::Cron(_) => false,
            Schedule::At(at) => now >= *at,
        }
    }

    pub fn should_execute_now(&self) -> bool {
        self.is_due_at(Utc::now())
    }
}

impl fmt::Display for Schedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Schedule::Cron(expr) => write!(f, "cron: {expr}"),
            Schedule::At(at) => write!(f, "at: {}", at.to_rfc3339()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_exactly_one_field_required() {
        assert_eq!(
            Schedule::from_parts(None, None),
            Err(ScheduleConfigError::MissingSchedule)
        );
        assert_eq!(
            Schedule::from_parts(Some("0 * * * *".into()), Some(Utc::now())),
            Err(ScheduleConfigError::ConflictingSchedule)
        );
        assert!(Schedule::from_parts(Some("0 * * * *".into()), None)
            .unwrap()
            .is_recurring());
    }

    #[test]
    fn test_blank_cron_counts_as_absent() {
        assert_eq!(
            Schedule::from_parts(Some("   ".into()), None),
            Err(ScheduleConfigError::MissingSchedule)
        );
        let at = Utc::now();
        assert_eq!(
            Schedule::from_parts(Some(String::new()), Some(at)),
            Ok(Schedule::At(at))
        );
    }

    #[test]
    fn test_due_boundaries() {
        let now = Utc::now();
        let at = Schedule::At(now);
        assert!(at.is_due_at(now));
        assert!(!at.is_due_at(now - Duration::seconds(1)));
        assert!(!Schedule::Cron("* * * * *".into()).is_due_at(now));
    }

    #[test]
    fn test_error_messages() {
        assert_eq!(
            ScheduleConfigError::MissingSchedule.to_string(),
            "Either cron_expression or execute_at must be provided"
        );
        assert_eq!(
            ScheduleConfigError::ConflictingSchedule.to_string(),
            "Only one of cron_expression or execute_at should be provided"
        );
    }
}
