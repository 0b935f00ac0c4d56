// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Supervision Policies
//!
//! A supervisor decides, per [`ActionInvocation`], whether the action may run.
//! Two capability traits share one decision contract:
//!
//! | Trait | Call path | May suspend |
//! |-------|-----------|-------------|
//! | [`Supervisor`] | blocking | no, must stay fast and free of I/O |
//! | [`AsyncSupervisor`] | suspendable | yes, e.g. remote allow-list lookups |
//!
//! Decisions are data: a denial is `SupervisorDecision { approved: false, .. }`,
//! never an error.
//!
//! ## Rule-based policy
//!
//! [`RuleBasedSupervisor`] matches [`Rule`]s by action name and runs each
//! rule's field validations in declaration order; the first failing validation
//! denies the call with that validation's reason.
//!
//! **Access control note:** an action with no matching rule is approved. The
//! rule set is a deny-list of field constraints, not an allow-list of actions.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::invocation::{ActionInvocation, Arguments};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupervisorDecision {
    pub approved: bool,
    /// Only populated on denial.
    pub reason: Option<String>,
}

impl SupervisorDecision {
    pub fn approve() -> Self {
        Self {
            approved: true,
            reason: None,
        }
    }

    pub fn deny(reason: impl Into<String>) -> Self {
        Self {
            approved: false,
            reason: Some(reason.into()),
        }
    }

    pub fn deny_silently() -> Self {
        Self {
            approved: false,
            reason: None,
        }
    }

    pub fn is_approved(&self) -> bool {
        self.approved
    }

    pub fn into_parts(self) -> (bool, Option<String>) {
        (self.approved, self.reason)
    }
}

/// Which gate path produced a decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckPath {
    Blocking,
    Suspendable,
    /// A suspendable caller checked against a blocking supervisor inline.
    BlockingFallback,
    Unsupervised,
}

impl CheckPath {
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckPath::Blocking => "blocking",
            CheckPath::Suspendable => "suspendable",
            CheckPath::BlockingFallback => "blocking_fallback",
            CheckPath::Unsupervised => "unsupervised",
        }
    }
}

/// Blocking policy check. Implementations sit inline on every action call.
///
/// Stateful implementations are shared behind `Arc` and called from many
/// tasks at once, so interior state must be synchronized.
pub trait Supervisor: Send + Sync {
    fn approve(&self, invocation: &ActionInvocation) -> SupervisorDecision;
}

#[async_trait]
pub trait AsyncSupervisor: Send + Sync {
    async fn approve_async(&self, invocation: &ActionInvocation) -> SupervisorDecision;
}

/// Field predicate: returns whether the value passes and, on failure, why.
pub type Validation = Arc<dyn Fn(&Value) -> (bool, Option<String>) + Send + Sync>;

/// Field-level admission policy for one action.
#[derive(Clone)]
pub struct Rule {
    pub action_name: String,
    validations: Vec<(String, Validation)>,
}

impl Rule {
    pub fn new(action_name: impl Into<String>) -> Self {
        Self {
            action_name: action_name.into(),
            validations: Vec::new(),
        }
    }

    /// Adds a predicate for `field`. Re-declaring a field replaces its
    /// predicate but keeps the original evaluation position.
    pub fn validate<F>(mut self, field: impl Into<String>, predicate: F) -> Self
    where
        F: Fn(&Value) -> (bool, Option<String>) + Send + Sync + 'static,
    {
        let field = field.into();
        let predicate: Validation = Arc::new(predicate);
        match self.validations.iter_mut().find(|(name, _)| *name == field) {
            Some(slot) => slot.1 = predicate,
            None => self.validations.push((field, predicate)),
        }
        self
    }

    pub fn matches(&self, action_name: &str) -> bool {
        self.action_name == action_name
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.validations.iter().map(|(field, _)| field.as_str())
    }

    /// Returns the first failing validation as a denial. Fields absent from
    /// `arguments` are not checked.
    pub fn evaluate(&self, arguments: &Arguments) -> Option<SupervisorDecision> {
        for (field, predicate) in &self.validations {
            let Some(value) = arguments.get(field) else {
                continue;
            };
            let (ok, reason) = predicate(value);
            if !ok {
                return Some(SupervisorDecision {
                    approved: false,
                    reason,
                });
            }
        }
        None
    }
}

impl fmt::Debug for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rule")
            .field("action_name", &self.action_name)
            .field("fields", &self.fields().collect::<Vec<_>>())
            .finish()
    }
}

fn evaluate_rules(rules: &[Rule], invocation: &ActionInvocation) -> SupervisorDecision {
    rules
        .iter()
        .filter(|rule| rule.matches(&invocation.action_name))
        .find_map(|rule| rule.evaluate(&invocation.arguments))
        .unwrap_or_else(SupervisorDecision::approve)
}

/// Rule-based policy. Unmatched action names fail open.
#[derive(Debug, Clone, Default)]
pub struct RuleBasedSupervisor {
    rules: Vec<Rule>,
}

impl RuleBasedSupervisor {
    pub fn new(rules: Vec<Rule>) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }
}

impl Supervisor for RuleBasedSupervisor {
    fn approve(&self, invocation: &ActionInvocation) -> SupervisorDecision {
        evaluate_rules(&self.rules, invocation)
    }
}

/// Suspendable twin of [`RuleBasedSupervisor`]. Yields to the scheduler
/// between matching rules so large rule sets do not starve sibling tasks.
#[derive(Debug, Clone, Default)]
pub struct AsyncRuleBasedSupervisor {
    rules: Vec<Rule>,
}

impl AsyncRuleBasedSupervisor {
    pub fn new(rules: Vec<Rule>) -> Self {
        Self { rules }
    }
}

#[async_trait]
impl AsyncSupervisor for AsyncRuleBasedSupervisor {
    async fn approve_async(&self, invocation: &ActionInvocation) -> SupervisorDecision {
        for rule in self.rules.iter().filter(|r| r.matches(&invocation.action_name)) {
            if let Some(denial) = rule.evaluate(&invocation.arguments) {
                return denial;
            }
            tokio::task::yield_now().await;
        }
        SupervisorDecision::approve()
    }
}

/// Approves every other call: denies odd-numbered calls, approves even ones.
#[derive(Debug, Default)]
pub struct AlternatingSupervisor {
    counter: AtomicU64,
}

impl AlternatingSupervisor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> u64 {
        self.counter.load(Ordering::SeqCst)
    }

    fn next(&self, denial: &str) -> SupervisorDecision {
        let count = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        if count % 2 == 0 {
            SupervisorDecision::approve()
        } else {
            SupervisorDecision::deny(denial)
        }
    }
}

impl Supervisor for AlternatingSupervisor {
    fn approve(&self, _invocation: &ActionInvocation) -> SupervisorDecision {
        self.next("Denied by AlternatingSupervisor")
    }
}

#[derive(Debug, Default)]
pub struct AsyncAlternatingSupervisor {
    inner: AlternatingSupervisor,
}

impl AsyncAlternatingSupervisor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> u64 {
        self.inner.calls()
    }
}

#[async_trait]
impl AsyncSupervisor for AsyncAlternatingSupervisor {
    async fn approve_async(&self, _invocation: &ActionInvocation) -> SupervisorDecision {
        self.inner.next("Denied by AsyncAlternatingSupervisor")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::invocation::arguments_from;
    use serde_json::json;

    fn positive_x_rule() -> Rule {
        Rule::new("dummy_tool").validate("x", |value| {
            if value.as_i64().unwrap_or(0) > 0 {
                (true, None)
            } else {
                (false, Some("x must be greater than 0".to_string()))
            }
        })
    }

    fn invocation(action: &str, args: Value) -> ActionInvocation {
        ActionInvocation::new(action, arguments_from(args))
    }

    #[test]
    fn test_rule_based_approves_passing_fields() {
        let supervisor = RuleBasedSupervisor::new(vec![positive_x_rule()]);
        let decision = supervisor.approve(&invocation("dummy_tool", json!({"x": 1})));
        assert_eq!(decision, SupervisorDecision::approve());
    }

    #[test]
    fn test_rule_based_denies_with_predicate_reason() {
        let supervisor = RuleBasedSupervisor::new(vec![positive_x_rule()]);
        let decision = supervisor.approve(&invocation("dummy_tool", json!({"x": -1})));
        assert_eq!(
            decision.into_parts(),
            (false, Some("x must be greater than 0".to_string()))
        );
    }

    #[test]
    fn test_unmatched_action_fails_open() {
        let supervisor = RuleBasedSupervisor::new(vec![positive_x_rule()]);
        let decision = supervisor.approve(&invocation("other_tool", json!({"x": -100})));
        assert!(decision.is_approved());
        assert!(decision.reason.is_none());
    }

    #[test]
    fn test_absent_field_is_not_validated() {
        let supervisor = RuleBasedSupervisor::new(vec![positive_x_rule()]);
        let decision = supervisor.approve(&invocation("dummy_tool", json!({"y": -1})));
        assert!(decision.is_approved());
    }

    #[test]
    fn test_first_failing_validation_wins_in_declaration_order() {
        let rule = Rule::new("transfer")
            .validate("amount", |_| (false, Some("amount rejected".to_string())))
            .validate("to", |_| (false, Some("recipient rejected".to_string())));
        let supervisor = RuleBasedSupervisor::new(vec![rule]);

        // Argument order must not influence which validation runs first.
        let decision = supervisor.approve(&invocation("transfer", json!({"to": "0xabc", "amount": 5})));
        assert_eq!(decision.reason.as_deref(), Some("amount rejected"));
    }

    #[test]
    fn test_earlier_rule_short_circuits_later_rules() {
        let first = Rule::new("transfer").validate("amount", |_| (false, Some("first".to_string())));
        let second = Rule::new("transfer").validate("amount", |_| (false, Some("second".to_string())));
        let supervisor = RuleBasedSupervisor::new(vec![first, second]);

        let decision = supervisor.approve(&invocation("transfer", json!({"amount": 1})));
        assert_eq!(decision.reason.as_deref(), Some("first"));
    }

    #[test]
    fn test_redeclared_field_replaces_predicate() {
        let rule = Rule::new("dummy_tool")
            .validate("x", |_| (false, Some("old".to_string())))
            .validate("x", |_| (true, None));
        assert_eq!(rule.fields().count(), 1);

        let supervisor = RuleBasedSupervisor::new(vec![rule]);
        assert!(supervisor.approve(&invocation("dummy_tool", json!({"x": 1}))).is_approved());
    }

    #[test]
    fn test_alternating_supervisor_sequence() {
        let supervisor = AlternatingSupervisor::new();
        let call = invocation("dummy_tool", json!({"x": 1}));

        assert_eq!(
            supervisor.approve(&call),
            SupervisorDecision::deny("Denied by AlternatingSupervisor")
        );
        assert!(supervisor.approve(&call).is_approved());
        assert!(!supervisor.approve(&call).is_approved());
        assert_eq!(supervisor.calls(), 3);
    }

    #[tokio::test]
    async fn test_async_rule_based_matches_blocking_contract() {
        let rules = vec![positive_x_rule()];
        let blocking = RuleBasedSupervisor::new(rules.clone());
        let suspendable = AsyncRuleBasedSupervisor::new(rules);

        for args in [json!({"x": 3}), json!({"x": 0}), json!({})] {
            let call = invocation("dummy_tool", args);
            assert_eq!(blocking.approve(&call), suspendable.approve_async(&call).await);
        }
    }

    #[test]
    fn test_async_alternating_supervisor_direct() {
        let supervisor = AsyncAlternatingSupervisor::new();
        let call = invocation("test", json!({"test": "data"}));

        let first = tokio_test::block_on(supervisor.approve_async(&call));
        assert_eq!(
            first.into_parts(),
            (false, Some("Denied by AsyncAlternatingSupervisor".to_string()))
        );

        let second = tokio_test::block_on(supervisor.approve_async(&call));
        assert_eq!(second.into_parts(), (true, None));
    }
}
