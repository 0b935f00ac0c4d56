// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Tickets
//!
//! A [`Ticket`] is the handle for one background execution of a service's
//! action. Lifecycle:
//!
//! ```text
//! Pending ──start──▶ Running ──complete──▶ Completed
//!    │                  │ └────fail──────▶ Failed
//!    └──────cancel──────┴────────────────▶ Cancelled
//! ```
//!
//! `Pending` and `Running` are transient; the other three are terminal.
//! Every transition refreshes `updated_at`.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::invocation::Arguments;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TicketId(pub Uuid);

impl TicketId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn parse(value: &str) -> Result<Self, uuid::Error> {
        Ok(Self(Uuid::parse_str(value)?))
    }
}

impl Default for TicketId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TicketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TicketStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl TicketStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TicketStatus::Completed | TicketStatus::Failed | TicketStatus::Cancelled
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TicketStatus::Pending => "PENDING",
            TicketStatus::Running => "RUNNING",
            TicketStatus::Completed => "COMPLETED",
            TicketStatus::Failed => "FAILED",
            TicketStatus::Cancelled => "CANCELLED",
        }
    }
}

impl fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TicketError {
    #[error("Invalid ticket transition from {from} to {to}")]
    InvalidTransition { from: TicketStatus, to: TicketStatus },
}

/// What a ticket was created to run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TicketRequest {
    pub action_name: String,
    pub arguments: Arguments,
}

impl TicketRequest {
    pub fn new(action_name: impl Into<String>, arguments: Arguments) -> Self {
        Self {
            action_name: action_name.into(),
            arguments,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ticket {
    pub id: TicketId,
    pub status: TicketStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub request: TicketRequest,
}

impl Ticket {
    pub fn new(request: TicketRequest) -> Self {
        let now = Utc::now();
        Self {
            id: TicketId::new(),
            status: TicketStatus::Pending,
            created_at: now,
            updated_at: now,
            request,
        }
    }

    pub fn start(&mut self) -> Result<(), TicketError> {
        self.transition(&[TicketStatus::Pending], TicketStatus::Running)
    }

    pub fn complete(&mut self) -> Result<(), TicketError> {
        self.transition(&[TicketStatus::Running], TicketStatus::Completed)
    }

    pub fn fail(&mut self) -> Result<(), TicketError> {
        self.transition(&[TicketStatus::Running], TicketStatus::Failed)
    }

    pub fn cancel(&mut self) -> Result<(), TicketError> {
        self.transition(
            &[TicketStatus::Pending, TicketStatus::Running],
            TicketStatus::Cancelled,
        )
    }

    fn transition(&mut self, from: &[TicketStatus], to: TicketStatus) -> Result<(), TicketError> {
        if !from.contains(&self.status) {
            return Err(TicketError::InvalidTransition {
                from: self.status,
                to,
            });
        }
        self.status = to;
        self.updated_at = Utc::now();
        Ok(())
    }
}

/// Final outcome of a ticket. Written once, by the worker, when it finishes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TicketResult {
    pub id: TicketId,
    pub status: TicketStatus,
    pub result: Option<Value>,
    pub error: Option<String>,
}

impl TicketResult {
    pub fn completed(id: TicketId, result: Value) -> Self {
        Self {
            id,
            status: TicketStatus::Completed,
            result: Some(result),
            error: None,
        }
    }

    pub fn failed(id: TicketId, error: impl Into<String>) -> Self {
        Self {
            id,
            status: TicketStatus::Failed,
            result: None,
            error: Some(error.into()),
        }
    }
}

/// What happens when a worker finishes after its ticket was cancelled.
///
/// Cancellation never stops the worker, so a cancelled ticket can still
/// produce an outcome. The ticket itself stays `Cancelled` either way.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LateResultPolicy {
    /// Drop the late outcome; `get_ticket_result` stays empty.
    #[default]
    Discard,
    /// Store the late outcome with its real status next to the cancelled
    /// ticket.
    Retain,
}
