// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod action;
pub mod config;
pub mod events;
pub mod invocation;
pub mod job;
pub mod schedule;
pub mod service;
pub mod startup_task;
pub mod supervisor;
pub mod task_record;
pub mod ticket;
