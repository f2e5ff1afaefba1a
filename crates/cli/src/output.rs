// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use clap::ValueEnum;
use runq_core::{format_elapsed_ms, JobState, JobStatus, QueueStatus};
use serde::Serialize;

#[cfg(test)]
#[path = "output_tests.rs"]
mod tests;

#[derive(Clone, Copy, Debug, Default, PartialEq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

pub fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Exit code, or `-` when the job has none.
pub fn exit_cell(status: &JobStatus) -> String {
    status.exit_code.map(|code| code.to_string()).unwrap_or_else(|| "-".to_string())
}

/// Run time of a finished job, or `-`.
pub fn elapsed_cell(status: &JobStatus) -> String {
    status.run_ms().map(format_elapsed_ms).unwrap_or_else(|| "-".to_string())
}

/// One-line summary, e.g. `job-3 done in 1.2s` or `job-4 error: exit failure: exit code 2`.
pub fn summary_line(status: &JobStatus) -> String {
    let mut line = format!("{} {}", status.id, status.state);
    if let Some(error) = &status.error {
        line.push_str(&format!(": {error}"));
    }
    match (status.state, status.run_ms()) {
        (JobState::Done | JobState::Error | JobState::Killed, Some(ms)) => {
            line.push_str(&format!(" in {}", format_elapsed_ms(ms)));
        }
        (JobState::Pending | JobState::Running, _) => line.push_str(" (not finished)"),
        _ => {}
    }
    line
}

/// Slot column for a queue: `1/4` occupied out of max, or `3/-` when unbounded.
pub fn slots_cell(queue: &QueueStatus) -> String {
    match queue.max_slots {
        Some(max) => format!("{}/{max}", queue.running),
        None => format!("{}/-", queue.running),
    }
}
