// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::supervisor::CheckPath;
use crate::domain::ticket::{TicketId, TicketStatus};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SupervisionEvent {
    ActionApproved {
        action_name: String,
        path: CheckPath,
        decided_at: DateTime<Utc>,
    },
    ActionDenied {
        action_name: String,
        path: CheckPath,
        reason: Option<String>,
        decided_at: DateTime<Utc>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TicketEvent {
    TicketCreated {
        ticket_id: TicketId,
        action_name: String,
        created_at: DateTime<Utc>,
    },
    TicketStarted {
        ticket_id: TicketId,
        started_at: DateTime<Utc>,
    },
    TicketFinalized {
        ticket_id: TicketId,
        status: TicketStatus,
        error: Option<String>,
        finalized_at: DateTime<Utc>,
    },
    TicketCancelled {
        ticket_id: TicketId,
        cancelled_at: DateTime<Utc>,
    },
    /// A worker finished after its ticket had been cancelled.
    LateResultArrived {
        ticket_id: TicketId,
        status: TicketStatus,
        retained: bool,
        arrived_at: DateTime<Utc>,
    },
}

impl TicketEvent {
    pub fn ticket_id(&self) -> TicketId {
        match self {
            TicketEvent::TicketCreated { ticket_id, .. }
            | TicketEvent::TicketStarted { ticket_id, .. }
            | TicketEvent::TicketFinalized { ticket_id, .. }
            | TicketEvent::TicketCancelled { ticket_id, .. }
            | TicketEvent::LateResultArrived { ticket_id, .. } => *ticket_id,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum JobEvent {
    JobRegistered {
        job_name: String,
        replaced: bool,
        registered_at: DateTime<Utc>,
    },
    JobUnregistered {
        job_name: String,
        unregistered_at: DateTime<Utc>,
    },
    JobPaused {
        job_name: String,
        paused_at: DateTime<Utc>,
    },
    JobResumed {
        job_name: String,
        resumed_at: DateTime<Utc>,
    },
    JobExecuted {
        job_name: String,
        executed_at: DateTime<Utc>,
    },
    JobFailed {
        job_name: String,
        error: String,
        failed_at: DateTime<Utc>,
    },
    JobSkipped {
        job_name: String,
        reason: String,
        skipped_at: DateTime<Utc>,
    },
    StartupTaskRecorded {
        task_name: String,
        task_hash: String,
        succeeded: bool,
        recorded_at: DateTime<Utc>,
    },
}
