// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Job Registry
//!
//! In-process catalogue of [`ScheduledJob`]s. An external scheduler decides
//! *when* to fire (cron evaluation is not done here) and calls
//! [`JobRegistry::execute`]; the registry decides *whether* the run happens:
//!
//! 1. the job must be enabled (see [`JobRegistry::pause`]);
//! 2. the supervision gate must approve, with the job name as action name;
//! 3. fewer than `max_instances` runs of the job may be in flight.
//!
//! One-time jobs are unregistered after they run, whether the run succeeded
//! or not.

use std::collections::HashMap;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Utc;
use futures::FutureExt;
use parking_lot::RwLock;
use serde_json::Value;
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};

use crate::application::supervision::SupervisionGate;
use crate::domain::events::JobEvent;
use crate::domain::invocation::{ActionInvocation, Arguments};
use crate::domain::job::{JobSpec, ScheduledJob};
use crate::domain::service::panic_message;
use crate::infrastructure::event_bus::EventBus;
use crate::infrastructure::telemetry::JOBS_EXECUTED_TOTAL;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    Disabled,
    Denied(Option<String>),
    MaxInstancesReached,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::Disabled => f.write_str("job is disabled"),
            SkipReason::Denied(Some(reason)) => write!(f, "denied by supervisor: {}", reason),
            SkipReason::Denied(None) => f.write_str("denied by supervisor"),
            SkipReason::MaxInstancesReached => f.write_str("max_instances reached"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum JobRunOutcome {
    Completed(Value),
    Failed(String),
    Skipped(SkipReason),
}

impl JobRunOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, JobRunOutcome::Completed(_))
    }

    fn label(&self) -> &'static str {
        match self {
            JobRunOutcome::Completed(_) => "completed",
            JobRunOutcome::Failed(_) => "failed",
            JobRunOutcome::Skipped(_) => "skipped",
        }
    }
}

struct RegisteredJob {
    job: Arc<dyn ScheduledJob>,
    enabled: AtomicBool,
    instances: Arc<Semaphore>,
}

impl RegisteredJob {
    fn new(job: Arc<dyn ScheduledJob>) -> Self {
        let spec = job.spec();
        Self {
            enabled: AtomicBool::new(spec.enabled()),
            instances: Arc::new(Semaphore::new(spec.max_instances() as usize)),
            job,
        }
    }

    fn effective_spec(&self) -> JobSpec {
        let mut spec = self.job.spec();
        spec.set_enabled(self.enabled.load(Ordering::SeqCst));
        spec
    }
}

#[derive(Default)]
pub struct JobRegistry {
    jobs: RwLock<HashMap<String, Arc<RegisteredJob>>>,
    gate: SupervisionGate,
    event_bus: Option<EventBus>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_gate(mut self, gate: SupervisionGate) -> Self {
        self.gate = gate;
        self
    }

    pub fn with_event_bus(mut self, event_bus: EventBus) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    fn publish(&self, event: JobEvent) {
        if let Some(event_bus) = &self.event_bus {
            event_bus.publish_job_event(event);
        }
    }

    /// Adds a job under its name, replacing any job already registered under
    /// that name. Returns true when a job was replaced.
    pub fn register(&self, job: Arc<dyn ScheduledJob>) -> bool {
        let name = job.name();
        let spec = job.spec();
        let replaced = self
            .jobs
            .write()
            .insert(name.clone(), Arc::new(RegisteredJob::new(job)))
            .is_some();

        if replaced {
            warn!(job = %name, "Replacing already registered job");
        }
        info!(job = %name, schedule = %spec.schedule(), "Registered job");
        self.publish(JobEvent::JobRegistered {
            job_name: name,
            replaced,
            registered_at: Utc::now(),
        });
        replaced
    }

    pub fn unregister(&self, name: &str) -> bool {
        let removed = self.jobs.write().remove(name).is_some();
        if removed {
            info!(job = %name, "Unregistered job");
            self.publish(JobEvent::JobUnregistered {
                job_name: name.to_string(),
                unregistered_at: Utc::now(),
            });
        }
        removed
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn ScheduledJob>> {
        self.jobs.read().get(name).map(|entry| Arc::clone(&entry.job))
    }

    /// Specs of all registered jobs, sorted by name, with `enabled`
    /// reflecting pause/resume.
    pub fn list(&self) -> Vec<JobSpec> {
        let mut specs: Vec<JobSpec> = self
            .jobs
            .read()
            .values()
            .map(|entry| entry.effective_spec())
            .collect();
        specs.sort_by(|a, b| a.name().cmp(b.name()));
        specs
    }

    pub fn len(&self) -> usize {
        self.jobs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.read().is_empty()
    }

    pub fn is_enabled(&self, name: &str) -> Option<bool> {
        self.jobs
            .read()
            .get(name)
            .map(|entry| entry.enabled.load(Ordering::SeqCst))
    }

    pub fn pause(&self, name: &str) -> bool {
        if !self.set_enabled(name, false) {
            return false;
        }
        info!(job = %name, "Paused job");
        self.publish(JobEvent::JobPaused {
            job_name: name.to_string(),
            paused_at: Utc::now(),
        });
        true
    }

    pub fn resume(&self, name: &str) -> bool {
        if !self.set_enabled(name, true) {
            return false;
        }
        info!(job = %name, "Resumed job");
        self.publish(JobEvent::JobResumed {
            job_name: name.to_string(),
            resumed_at: Utc::now(),
        });
        true
    }

    fn set_enabled(&self, name: &str, enabled: bool) -> bool {
        match self.jobs.read().get(name) {
            Some(entry) => {
                entry.enabled.store(enabled, Ordering::SeqCst);
                true
            }
            None => false,
        }
    }

    /// Names of enabled one-time jobs whose time has come, sorted.
    pub fn due_jobs(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .jobs
            .read()
            .iter()
            .filter(|(_, entry)| entry.enabled.load(Ordering::SeqCst))
            .filter(|(_, entry)| entry.job.should_execute_now())
            .map(|(name, _)| name.clone())
            .collect();
        names.sort();
        names
    }

    /// Runs the named job once. `None` when no such job is registered.
    pub async fn execute(&self, name: &str, arguments: Arguments) -> Option<JobRunOutcome> {
        let entry = self.jobs.read().get(name).cloned()?;

        let outcome = self.run_entry(name, &entry, arguments).await;
        metrics::counter!(JOBS_EXECUTED_TOTAL, "outcome" => outcome.label()).increment(1);
        Some(outcome)
    }

    async fn run_entry(
        &self,
        name: &str,
        entry: &Arc<RegisteredJob>,
        arguments: Arguments,
    ) -> JobRunOutcome {
        if !entry.enabled.load(Ordering::SeqCst) {
            return self.skipped(name, SkipReason::Disabled);
        }

        let invocation = ActionInvocation::new(name, arguments.clone());
        let decision = self.gate.check_suspendable(&invocation).await;
        if !decision.approved {
            return self.skipped(name, SkipReason::Denied(decision.reason));
        }

        let Ok(permit) = Arc::clone(&entry.instances).try_acquire_owned() else {
            return self.skipped(name, SkipReason::MaxInstancesReached);
        };

        info!(job = %name, "Executing job");
        let result = AssertUnwindSafe(entry.job.run(arguments))
            .catch_unwind()
            .await;
        drop(permit);

        if entry.job.is_one_time() {
            self.remove_if_same(name, entry);
        }

        match result {
            Ok(Ok(value)) => {
                info!(job = %name, "Job completed");
                self.publish(JobEvent::JobExecuted {
                    job_name: name.to_string(),
                    executed_at: Utc::now(),
                });
                JobRunOutcome::Completed(value)
            }
            Ok(Err(e)) => self.failed(name, e.to_string()),
            Err(panic) => self.failed(
                name,
                format!("job panicked: {}", panic_message(panic.as_ref())),
            ),
        }
    }

    /// Drops a finished one-time job unless it was replaced mid-run.
    fn remove_if_same(&self, name: &str, entry: &Arc<RegisteredJob>) {
        let removed = {
            let mut jobs = self.jobs.write();
            match jobs.get(name) {
                Some(current) if Arc::ptr_eq(current, entry) => jobs.remove(name).is_some(),
                _ => false,
            }
        };
        if removed {
            debug!(job = %name, "Removed one-time job after execution");
            self.publish(JobEvent::JobUnregistered {
                job_name: name.to_string(),
                unregistered_at: Utc::now(),
            });
        }
    }

    fn skipped(&self, name: &str, reason: SkipReason) -> JobRunOutcome {
        debug!(job = %name, reason = %reason, "Skipping job run");
        self.publish(JobEvent::JobSkipped {
            job_name: name.to_string(),
            reason: reason.to_string(),
            skipped_at: Utc::now(),
        });
        JobRunOutcome::Skipped(reason)
    }

    fn failed(&self, name: &str, message: String) -> JobRunOutcome {
        error!(job = %name, error = %message, "Job failed");
        self.publish(JobEvent::JobFailed {
            job_name: name.to_string(),
            error: message.clone(),
            failed_at: Utc::now(),
        });
        JobRunOutcome::Failed(message)
    }
}
