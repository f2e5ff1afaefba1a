// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `runq queues`: list the configured queues.

use anyhow::Result;
use runq_core::{EngineConfig, QueueStatus};
use runq_engine::JobManager;
use std::io::Write;

use crate::output::{print_json, slots_cell, OutputFormat};
use crate::table::{Column, Table};

pub async fn handle(config: EngineConfig, format: OutputFormat) -> Result<()> {
    let engine = JobManager::new(config)?;
    let queues: Vec<QueueStatus> =
        engine.queue_statuses(&[]).into_iter().collect::<Result<_, _>>()?;
    engine.shutdown().await;

    match format {
        OutputFormat::Text => format_queue_list(&mut std::io::stdout(), &queues),
        OutputFormat::Json => print_json(&queues)?,
    }
    Ok(())
}

pub(crate) fn format_queue_list(out: &mut impl Write, queues: &[QueueStatus]) {
    let mut table = Table::new(vec![
        Column::left("NAME"),
        Column::left("POLICY"),
        Column::right("SLOTS"),
        Column::right("PENDING"),
    ]);
    for queue in queues {
        table.row(vec![
            queue.name.clone(),
            queue.policy.to_string(),
            slots_cell(queue),
            queue.pending.to_string(),
        ]);
    }
    table.render(out);
}

#[cfg(test)]
#[path = "queues_tests.rs"]
mod tests;
