// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use async_trait::async_trait;
use serde_json::Value;

use crate::application::supervision::SupervisionGate;
use crate::domain::action::{Action, ActionError, ActionOutcome};
use crate::domain::invocation::{ActionInvocation, Arguments};

/// Message returned when a supervisor denies a call without giving a reason.
pub fn default_denial_message(action_name: &str) -> String {
    format!("Tool call to '{}' denied by supervisor.", action_name)
}

/// An [`Action`] whose every call passes a [`SupervisionGate`] first.
///
/// `call` and `call_async` return an [`ActionOutcome`] so callers can tell a
/// denial from a result. The [`Action`] impl collapses the outcome with
/// [`ActionOutcome::into_value`], which lets the wrapper stand in wherever the
/// bare action was used. Errors raised by the action propagate unchanged.
pub struct SupervisedAction<A> {
    action: A,
    gate: SupervisionGate,
}

impl<A: Action> SupervisedAction<A> {
    pub fn new(action: A, gate: SupervisionGate) -> Self {
        Self { action, gate }
    }

    pub fn unsupervised(action: A) -> Self {
        Self::new(action, SupervisionGate::unsupervised())
    }

    pub fn inner(&self) -> &A {
        &self.action
    }

    pub fn gate(&self) -> &SupervisionGate {
        &self.gate
    }

    /// Blocking entry point.
    pub fn call(&self, arguments: &Arguments) -> Result<ActionOutcome, ActionError> {
        if self.gate.is_supervised() {
            let invocation = ActionInvocation::new(self.action.name(), arguments.clone());
            let decision = self.gate.check_blocking(&invocation);
            if !decision.approved {
                return Ok(self.denial(decision.reason));
            }
        }
        self.action.invoke(arguments).map(ActionOutcome::completed)
    }

    /// Suspendable entry point.
    pub async fn call_async(&self, arguments: &Arguments) -> Result<ActionOutcome, ActionError> {
        if self.gate.is_supervised() {
            let invocation = ActionInvocation::new(self.action.name(), arguments.clone());
            let decision = self.gate.check_suspendable(&invocation).await;
            if !decision.approved {
                return Ok(self.denial(decision.reason));
            }
        }
        self.action
            .invoke_async(arguments)
            .await
            .map(ActionOutcome::completed)
    }

    fn denial(&self, reason: Option<String>) -> ActionOutcome {
        match reason {
            Some(reason) if !reason.is_empty() => ActionOutcome::denied(reason),
            _ => ActionOutcome::denied(default_denial_message(self.action.name())),
        }
    }
}

#[async_trait]
impl<A: Action> Action for SupervisedAction<A> {
    fn name(&self) -> &str {
        self.action.name()
    }

    fn invoke(&self, arguments: &Arguments) -> Result<Value, ActionError> {
        self.call(arguments).map(ActionOutcome::into_value)
    }

    async fn invoke_async(&self, arguments: &Arguments) -> Result<Value, ActionError> {
        self.call_async(arguments)
            .await
            .map(ActionOutcome::into_value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::invocation::arguments_from;
    use crate::domain::supervisor::{AlternatingSupervisor, Supervisor, SupervisorDecision};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct Counter {
        calls: AtomicUsize,
    }

    impl Action for Counter {
        fn name(&self) -> &str {
            "counter"
        }

        fn invoke(&self, _arguments: &Arguments) -> Result<Value, ActionError> {
            Ok(json!(self.calls.fetch_add(1, Ordering::SeqCst) + 1))
        }
    }

    struct SilentDenier;

    impl Supervisor for SilentDenier {
        fn approve(&self, _invocation: &ActionInvocation) -> SupervisorDecision {
            SupervisorDecision::deny_silently()
        }
    }

    fn counter() -> Counter {
        Counter {
            calls: AtomicUsize::new(0),
        }
    }

    #[test]
    fn test_denied_call_does_not_run_action() {
        let gate = SupervisionGate::unsupervised().with_supervisor(Arc::new(SilentDenier));
        let action = SupervisedAction::new(counter(), gate);

        let outcome = action.call(&Arguments::new()).unwrap();
        assert_eq!(
            outcome.denial_reason(),
            Some("Tool call to 'counter' denied by supervisor.")
        );
        assert_eq!(action.inner().calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_alternating_supervision_through_wrapper() {
        let gate =
            SupervisionGate::unsupervised().with_supervisor(Arc::new(AlternatingSupervisor::new()));
        let action = SupervisedAction::new(counter(), gate);
        let args = arguments_from(json!({}));

        assert!(action.call_async(&args).await.unwrap().is_denied());
        assert_eq!(
            action.invoke_async(&args).await.unwrap(),
            json!(1),
            "second call approved"
        );
        assert_eq!(
            action.invoke(&args).unwrap(),
            json!("Denied by AlternatingSupervisor")
        );
    }
}
