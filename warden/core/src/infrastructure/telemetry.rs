// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Logging setup and metric names.
//!
//! Counters are emitted through the `metrics` facade; they are no-ops until
//! the host process installs a recorder.

use anyhow::{Context, Result};

use crate::domain::config::{LogFormat, ObservabilityConfig};

pub const SUPERVISION_DECISIONS_TOTAL: &str = "warden_supervision_decisions_total";
pub const TICKETS_CREATED_TOTAL: &str = "warden_tickets_created_total";
pub const TICKETS_FINALIZED_TOTAL: &str = "warden_tickets_finalized_total";
pub const JOBS_EXECUTED_TOTAL: &str = "warden_jobs_executed_total";

/// Installs the global tracing subscriber. `RUST_LOG` takes precedence over
/// `level`. Fails if a subscriber is already installed.
pub fn init_logging(level: &str, format: LogFormat) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(level))
        .context("Failed to create log filter")?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);

    let installed = match format {
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
    installed.map_err(|e| anyhow::anyhow!("Failed to install tracing subscriber: {}", e))
}

pub fn init_from_config(config: &ObservabilityConfig) -> Result<()> {
    init_logging(&config.log_level, config.log_format)
}

/// Registers descriptions for every counter with the installed recorder.
pub fn describe_metrics() {
    metrics::describe_counter!(
        SUPERVISION_DECISIONS_TOTAL,
        "Supervision decisions by gate path and outcome"
    );
    metrics::describe_counter!(TICKETS_CREATED_TOTAL, "Tickets created");
    metrics::describe_counter!(
        TICKETS_FINALIZED_TOTAL,
        "Tickets reaching a terminal status, by status"
    );
    metrics::describe_counter!(JOBS_EXECUTED_TOTAL, "Scheduled job runs by outcome");
}
