// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Actions
//!
//! An [`Action`] is any callable the agent's dispatch layer can invoke with a
//! named argument set. Actions are wrapped by
//! [`crate::application::supervised_action::SupervisedAction`] so that each
//! call passes the supervision gate first.
//!
//! Denials are data, not errors: a gated call yields an [`ActionOutcome`].
//! Only failures raised by the action body itself surface as [`ActionError`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::domain::invocation::Arguments;

/// Failure raised by an action or service body.
///
/// `Failed` renders its message verbatim so that ticket results carry exactly
/// what the body reported.
#[derive(Debug, Error)]
pub enum ActionError {
    #[error("{0}")]
    Failed(String),

    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ActionError {
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }
}

#[async_trait]
pub trait Action: Send + Sync {
    fn name(&self) -> &str;

    /// Runs the action on the calling thread.
    fn invoke(&self, arguments: &Arguments) -> Result<Value, ActionError>;

    /// Suspendable entry point. Defaults to the blocking body.
    async fn invoke_async(&self, arguments: &Arguments) -> Result<Value, ActionError> {
        self.invoke(arguments)
    }
}

/// Result of a supervised call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ActionOutcome {
    Completed { value: Value },
    Denied { reason: String },
}

impl ActionOutcome {
    pub fn completed(value: Value) -> Self {
        Self::Completed { value }
    }

    pub fn denied(reason: impl Into<String>) -> Self {
        Self::Denied {
            reason: reason.into(),
        }
    }

    pub fn is_denied(&self) -> bool {
        matches!(self, Self::Denied { .. })
    }

    pub fn value(&self) -> Option<&Value> {
        match self {
            Self::Completed { value } => Some(value),
            Self::Denied { .. } => None,
        }
    }

    pub fn denial_reason(&self) -> Option<&str> {
        match self {
            Self::Completed { .. } => None,
            Self::Denied { reason } => Some(reason),
        }
    }

    /// Collapses the outcome into a plain value: the action's result, or the
    /// denial reason as a JSON string. Callers that only inspect return values
    /// see a readable message in place of the result.
    pub fn into_value(self) -> Value {
        match self {
            Self::Completed { value } => value,
            Self::Denied { reason } => Value::String(reason),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_failed_error_renders_verbatim() {
        let err = ActionError::failed("boom");
        assert_eq!(err.to_string(), "boom");
    }

    #[test]
    fn test_outcome_into_value() {
        assert_eq!(ActionOutcome::completed(json!(42)).into_value(), json!(42));
        assert_eq!(
            ActionOutcome::denied("nope").into_value(),
            Value::String("nope".to_string())
        );
    }

    #[test]
    fn test_outcome_serialization_is_tagged() {
        let json = serde_json::to_value(ActionOutcome::denied("x must be positive")).unwrap();
        assert_eq!(json["outcome"], "denied");
        assert_eq!(json["reason"], "x must be positive");
    }
}
