// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Ticketed Execution Engine
//!
//! Turns one [`Service`] into pollable background work. Each
//! [`TicketEngine::create_ticket`] call stores a `Pending` ticket, spawns a
//! worker and returns at once; callers then poll status and result by id.
//!
//! ## Concurrency
//!
//! - Ticket, result and worker maps share one `parking_lot::RwLock`, never
//!   held across an `.await`.
//! - At most `max_concurrent_workers` services run at once. Queued workers
//!   wait on a semaphore and their tickets stay `Pending`.
//! - A worker owns its ticket's transitions until it finalizes, except for
//!   cancellation.
//!
//! ## Cancellation
//!
//! Cancellation is advisory. `cancel_ticket` waits up to `cancel_wait` for
//! the worker, never aborts it, then marks the ticket `Cancelled` if it is
//! still `Pending` or `Running`. A worker still queued at that point never
//! runs the service. A worker already running finishes; its outcome is
//! handled by [`LateResultPolicy`].

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::FutureExt;
use parking_lot::RwLock;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::domain::config::TicketsConfig;
use crate::domain::events::TicketEvent;
use crate::domain::invocation::Arguments;
use crate::domain::service::{panic_message, Service};
use crate::domain::ticket::{
    LateResultPolicy, Ticket, TicketId, TicketRequest, TicketResult, TicketStatus,
};
use crate::infrastructure::event_bus::EventBus;
use crate::infrastructure::telemetry::{TICKETS_CREATED_TOTAL, TICKETS_FINALIZED_TOTAL};

const RESULT_POLL_INTERVAL: Duration = Duration::from_millis(10);

#[derive(Debug, Clone)]
pub struct TicketEngineConfig {
    pub max_concurrent_workers: usize,
    pub cancel_wait: Duration,
    pub late_result_policy: LateResultPolicy,
}

impl Default for TicketEngineConfig {
    fn default() -> Self {
        TicketEngineConfig::from(&TicketsConfig::default())
    }
}

impl From<&TicketsConfig> for TicketEngineConfig {
    fn from(config: &TicketsConfig) -> Self {
        Self {
            max_concurrent_workers: config.max_concurrent_workers.max(1),
            cancel_wait: Duration::from_millis(config.cancel_wait_ms),
            late_result_policy: config.late_result_policy,
        }
    }
}

#[derive(Default)]
struct TicketBook {
    tickets: HashMap<TicketId, Ticket>,
    results: HashMap<TicketId, TicketResult>,
    workers: HashMap<TicketId, JoinHandle<()>>,
}

struct EngineState {
    book: RwLock<TicketBook>,
    service: Arc<dyn Service>,
    permits: Semaphore,
    config: TicketEngineConfig,
    event_bus: Option<EventBus>,
}

impl EngineState {
    fn publish(&self, event: TicketEvent) {
        if let Some(event_bus) = &self.event_bus {
            event_bus.publish_ticket_event(event);
        }
    }

    /// Moves a queued ticket to `Running`. False when it was cancelled or
    /// removed while waiting for a permit.
    fn start(&self, id: TicketId) -> bool {
        let mut book = self.book.write();
        let started = match book.tickets.get_mut(&id) {
            Some(ticket) => ticket.start().is_ok(),
            None => false,
        };
        if !started {
            book.workers.remove(&id);
        }
        started
    }

    fn finalize(&self, result: TicketResult) {
        let id = result.id;
        let status = result.status;
        let error_message = result.error.clone();

        let mut guard = self.book.write();
        let book = &mut *guard;
        book.workers.remove(&id);

        let Some(ticket) = book.tickets.get_mut(&id) else {
            warn!(ticket_id = %id, "Worker finished for an unknown ticket");
            return;
        };

        if ticket.status == TicketStatus::Cancelled {
            let retained = self.config.late_result_policy == LateResultPolicy::Retain;
            if retained {
                book.results.insert(id, result);
            }
            drop(guard);
            debug!(ticket_id = %id, %status, retained, "Late result for cancelled ticket");
            self.publish(TicketEvent::LateResultArrived {
                ticket_id: id,
                status,
                retained,
                arrived_at: Utc::now(),
            });
            return;
        }

        let transition = match status {
            TicketStatus::Completed => ticket.complete(),
            _ => ticket.fail(),
        };
        if let Err(e) = transition {
            warn!(ticket_id = %id, error = %e, "Dropping worker result");
            return;
        }
        book.results.insert(id, result);
        drop(guard);

        metrics::counter!(TICKETS_FINALIZED_TOTAL, "status" => status.as_str()).increment(1);
        match &error_message {
            None => info!(ticket_id = %id, "Ticket completed"),
            Some(message) => error!(ticket_id = %id, error = %message, "Ticket failed"),
        }
        self.publish(TicketEvent::TicketFinalized {
            ticket_id: id,
            status,
            error: error_message,
            finalized_at: Utc::now(),
        });
    }
}

async fn run_worker(state: Arc<EngineState>, id: TicketId, arguments: Arguments) {
    let _permit = match state.permits.acquire().await {
        Ok(permit) => permit,
        Err(e) => {
            error!(ticket_id = %id, error = %e, "Worker pool closed");
            return;
        }
    };

    if !state.start(id) {
        debug!(ticket_id = %id, "Ticket cancelled before it started");
        return;
    }
    state.publish(TicketEvent::TicketStarted {
        ticket_id: id,
        started_at: Utc::now(),
    });

    let outcome = AssertUnwindSafe(state.service.run(arguments))
        .catch_unwind()
        .await;
    let result = match outcome {
        Ok(Ok(value)) => TicketResult::completed(id, value),
        Ok(Err(e)) => TicketResult::failed(id, e.to_string()),
        Err(panic) => TicketResult::failed(
            id,
            format!("service panicked: {}", panic_message(panic.as_ref())),
        ),
    };
    state.finalize(result);
}

/// Background executor for one service. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct TicketEngine {
    state: Arc<EngineState>,
}

impl TicketEngine {
    pub fn new(service: Arc<dyn Service>) -> Self {
        Self::with_config(service, TicketEngineConfig::default())
    }

    pub fn with_config(service: Arc<dyn Service>, config: TicketEngineConfig) -> Self {
        Self::build(service, config, None)
    }

    pub fn with_event_bus(
        service: Arc<dyn Service>,
        config: TicketEngineConfig,
        event_bus: EventBus,
    ) -> Self {
        Self::build(service, config, Some(event_bus))
    }

    fn build(
        service: Arc<dyn Service>,
        config: TicketEngineConfig,
        event_bus: Option<EventBus>,
    ) -> Self {
        let permits = Semaphore::new(config.max_concurrent_workers.max(1));
        Self {
            state: Arc::new(EngineState {
                book: RwLock::new(TicketBook::default()),
                service,
                permits,
                config,
                event_bus,
            }),
        }
    }

    pub fn config(&self) -> &TicketEngineConfig {
        &self.state.config
    }

    /// Name of the action this engine runs.
    pub fn action_name(&self) -> &str {
        self.state.service.name()
    }

    /// Name under which ticket creation is exposed as a tool.
    pub fn ticket_tool_name(&self) -> String {
        format!("create_{}_ticket", self.action_name())
    }

    /// Stores a `Pending` ticket and schedules its worker. Returns without
    /// waiting for the service. Must be called from within a Tokio runtime.
    pub fn create_ticket(&self, arguments: Arguments) -> Ticket {
        let ticket = Ticket::new(TicketRequest::new(self.action_name(), arguments.clone()));
        let id = ticket.id;
        let snapshot = ticket.clone();

        {
            let mut book = self.state.book.write();
            book.tickets.insert(id, ticket);
            // Spawned under the lock so the handle is recorded before the
            // worker can finalize and remove it.
            let handle = tokio::spawn(run_worker(Arc::clone(&self.state), id, arguments));
            book.workers.insert(id, handle);
        }

        metrics::counter!(TICKETS_CREATED_TOTAL).increment(1);
        info!(ticket_id = %id, action = %snapshot.request.action_name, "Ticket created");
        self.state.publish(TicketEvent::TicketCreated {
            ticket_id: id,
            action_name: snapshot.request.action_name.clone(),
            created_at: snapshot.created_at,
        });
        snapshot
    }

    pub fn get_ticket_status(&self, id: TicketId) -> Option<Ticket> {
        self.state.book.read().tickets.get(&id).cloned()
    }

    pub fn get_ticket_result(&self, id: TicketId) -> Option<TicketResult> {
        self.state.book.read().results.get(&id).cloned()
    }

    /// Waits up to `cancel_wait` for the worker, then marks the ticket
    /// `Cancelled` if it has not reached a terminal status. Returns the
    /// ticket as it stands afterwards, or `None` for an unknown id.
    pub async fn cancel_ticket(&self, id: TicketId) -> Option<Ticket> {
        let handle = {
            let mut book = self.state.book.write();
            if !book.tickets.contains_key(&id) {
                return None;
            }
            book.workers.remove(&id)
        };

        if let Some(mut handle) = handle {
            if tokio::time::timeout(self.state.config.cancel_wait, &mut handle)
                .await
                .is_err()
            {
                // Dropping a JoinHandle detaches the task; keep it for later
                // cancels while the ticket can still change. A worker that
                // already finalized has removed its own entry.
                let mut book = self.state.book.write();
                let live = book
                    .tickets
                    .get(&id)
                    .is_some_and(|ticket| !ticket.status.is_terminal());
                if live && !handle.is_finished() {
                    book.workers.insert(id, handle);
                }
            }
        }

        let (snapshot, cancelled) = {
            let mut book = self.state.book.write();
            let ticket = book.tickets.get_mut(&id)?;
            let cancelled = ticket.cancel().is_ok();
            (ticket.clone(), cancelled)
        };

        if cancelled {
            metrics::counter!(TICKETS_FINALIZED_TOTAL, "status" => TicketStatus::Cancelled.as_str())
                .increment(1);
            info!(ticket_id = %id, "Ticket cancelled");
            self.state.publish(TicketEvent::TicketCancelled {
                ticket_id: id,
                cancelled_at: snapshot.updated_at,
            });
        } else {
            debug!(ticket_id = %id, status = %snapshot.status, "Cancel on terminal ticket");
        }
        Some(snapshot)
    }

    #[cfg(test)]
    fn tracked_workers(&self) -> usize {
        self.state.book.read().workers.len()
    }

    /// All tickets, oldest first.
    pub fn get_all_tickets(&self) -> Vec<Ticket> {
        let mut tickets: Vec<Ticket> = self.state.book.read().tickets.values().cloned().collect();
        tickets.sort_by_key(|ticket| ticket.created_at);
        tickets
    }

    /// Polls until the ticket has a result or `timeout` elapses. Returns
    /// `None` early for an unknown id, or for a cancelled ticket whose late
    /// result will be discarded.
    pub async fn wait_for_result(&self, id: TicketId, timeout: Duration) -> Option<TicketResult> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            {
                let book = self.state.book.read();
                if let Some(result) = book.results.get(&id) {
                    return Some(result.clone());
                }
                let ticket = book.tickets.get(&id)?;
                if ticket.status == TicketStatus::Cancelled
                    && self.state.config.late_result_policy == LateResultPolicy::Discard
                {
                    return None;
                }
            }
            if tokio::time::Instant::now() >= deadline {
                return None;
            }
            tokio::time::sleep(RESULT_POLL_INTERVAL).await;
        }
    }
}
