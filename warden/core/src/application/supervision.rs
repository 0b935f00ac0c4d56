// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Supervision Gate
//!
//! Single place where an [`ActionInvocation`] meets the configured policy.
//! The gate picks the supervisor matching the caller's execution context and
//! records every decision in logs, metrics and on the event bus.
//!
//! | Caller | Async supervisor set | Blocking supervisor set | Result |
//! |--------|----------------------|-------------------------|--------|
//! | `check_suspendable` | yes | any | async decision |
//! | `check_suspendable` | no | yes | blocking decision, inline |
//! | `check_blocking` | any | yes | blocking decision |
//! | `check_blocking` | yes | no | denied, never run unsupervised |
//! | either | no | no | approved |
//!
//! A blocking caller cannot drive an async supervisor, so that combination
//! fails closed. Wrappers that ran such calls without any check let an
//! async-only policy be bypassed by choosing the blocking entry point; the
//! gate refuses instead.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info};

use crate::domain::events::SupervisionEvent;
use crate::domain::invocation::ActionInvocation;
use crate::domain::supervisor::{AsyncSupervisor, CheckPath, Supervisor, SupervisorDecision};
use crate::infrastructure::event_bus::EventBus;
use crate::infrastructure::telemetry::SUPERVISION_DECISIONS_TOTAL;

#[derive(Clone, Default)]
pub struct SupervisionGate {
    supervisor: Option<Arc<dyn Supervisor>>,
    async_supervisor: Option<Arc<dyn AsyncSupervisor>>,
    event_bus: Option<EventBus>,
}

impl SupervisionGate {
    /// A gate that approves everything.
    pub fn unsupervised() -> Self {
        Self::default()
    }

    pub fn with_supervisor(mut self, supervisor: Arc<dyn Supervisor>) -> Self {
        self.supervisor = Some(supervisor);
        self
    }

    pub fn with_async_supervisor(mut self, supervisor: Arc<dyn AsyncSupervisor>) -> Self {
        self.async_supervisor = Some(supervisor);
        self
    }

    pub fn with_event_bus(mut self, event_bus: EventBus) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    pub fn is_supervised(&self) -> bool {
        self.supervisor.is_some() || self.async_supervisor.is_some()
    }

    /// Decision for a caller that must not suspend.
    pub fn check_blocking(&self, invocation: &ActionInvocation) -> SupervisorDecision {
        let (path, decision) = match (&self.supervisor, &self.async_supervisor) {
            (Some(supervisor), _) => (CheckPath::Blocking, supervisor.approve(invocation)),
            (None, Some(_)) => (
                CheckPath::Blocking,
                SupervisorDecision::deny(format!(
                    "Action '{}' requires suspendable supervision",
                    invocation.action_name
                )),
            ),
            (None, None) => (CheckPath::Unsupervised, SupervisorDecision::approve()),
        };
        self.record(invocation, path, &decision);
        decision
    }

    /// Decision for a caller that may suspend. Falls back to the blocking
    /// supervisor, run inline, when no async supervisor is configured.
    pub async fn check_suspendable(&self, invocation: &ActionInvocation) -> SupervisorDecision {
        let (path, decision) = match (&self.async_supervisor, &self.supervisor) {
            (Some(supervisor), _) => (
                CheckPath::Suspendable,
                supervisor.approve_async(invocation).await,
            ),
            (None, Some(supervisor)) => {
                (CheckPath::BlockingFallback, supervisor.approve(invocation))
            }
            (None, None) => (CheckPath::Unsupervised, SupervisorDecision::approve()),
        };
        self.record(invocation, path, &decision);
        decision
    }

    fn record(&self, invocation: &ActionInvocation, path: CheckPath, decision: &SupervisorDecision) {
        let outcome = if decision.approved { "approved" } else { "denied" };
        metrics::counter!(
            SUPERVISION_DECISIONS_TOTAL,
            "path" => path.as_str(),
            "outcome" => outcome
        )
        .increment(1);

        if decision.approved {
            debug!(
                action = %invocation.action_name,
                path = path.as_str(),
                "Action approved"
            );
        } else {
            info!(
                action = %invocation.action_name,
                path = path.as_str(),
                reason = decision.reason.as_deref().unwrap_or(""),
                "Action denied by supervisor"
            );
        }

        let Some(event_bus) = &self.event_bus else {
            return;
        };
        let event = if decision.approved {
            SupervisionEvent::ActionApproved {
                action_name: invocation.action_name.clone(),
                path,
                decided_at: Utc::now(),
            }
        } else {
            SupervisionEvent::ActionDenied {
                action_name: invocation.action_name.clone(),
                path,
                reason: decision.reason.clone(),
                decided_at: Utc::now(),
            }
        };
        event_bus.publish_supervision_event(event);
    }
}
