// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod job_registry;
pub mod repository_factory;
pub mod startup_tasks;
pub mod supervised_action;
pub mod supervision;
pub mod ticket_engine;

pub use job_registry::{JobRegistry, JobRunOutcome, SkipReason};
pub use repository_factory::create_task_record_repository;
pub use startup_tasks::{StartupRunSummary, StartupTaskJob, StartupTaskManager};
pub use supervised_action::{default_denial_message, SupervisedAction};
pub use supervision::SupervisionGate;
pub use ticket_engine::{TicketEngine, TicketEngineConfig};
