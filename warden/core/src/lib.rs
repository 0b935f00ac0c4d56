// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Warden core
//!
//! Supervision and background execution for agent actions.
//!
//! # Architecture
//!
//! - **domain:** actions, supervisors, tickets, schedules, startup tasks, config
//! - **application:** supervision gate, supervised actions, ticket engine,
//!   job registry, startup task manager
//! - **infrastructure:** event bus, task record repositories, telemetry

pub mod domain;
pub mod application;
pub mod infrastructure;

pub use domain::*;
