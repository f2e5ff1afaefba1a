// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `runq batch`: submit every job of a TOML file and wait for all of them.
//!
//! ```toml
//! [[job]]
//! executable = "make"
//! arguments = ["test"]
//! queue = "multi"
//! stdout = { file = { path = "test.log" } }
//! ```

use anyhow::{bail, Context, Result};
use clap::Args;
use runq_core::{EngineConfig, JobDescription, JobState, JobStatus};
use runq_engine::JobManager;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::exit_error::ExitError;
use crate::output::{elapsed_cell, exit_cell, print_json, OutputFormat};
use crate::table::{Column, Table};

#[derive(Args, Debug)]
pub struct BatchArgs {
    /// TOML file with one `[[job]]` table per job
    pub file: PathBuf,
    /// Cancel whatever is still running after this long (e.g. 10m)
    #[arg(long, value_name = "DURATION", value_parser = super::parse_duration)]
    pub timeout: Option<Duration>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct BatchFile {
    #[serde(default, rename = "job")]
    jobs: Vec<JobDescription>,
}

pub(crate) fn parse_batch(source: &str) -> Result<Vec<JobDescription>> {
    let batch: BatchFile = toml::from_str(source)?;
    if batch.jobs.is_empty() {
        bail!("no [[job]] entries");
    }
    if let Some(index) = batch.jobs.iter().position(JobDescription::is_interactive) {
        bail!("job #{} streams its pipes, which a batch cannot serve", index + 1);
    }
    Ok(batch.jobs)
}

fn read_batch(path: &Path) -> Result<Vec<JobDescription>> {
    let source =
        std::fs::read_to_string(path).with_context(|| format!("cannot read {}", path.display()))?;
    parse_batch(&source).with_context(|| format!("invalid batch file {}", path.display()))
}

pub async fn handle(args: BatchArgs, config: EngineConfig, format: OutputFormat) -> Result<()> {
    let descriptions = read_batch(&args.file)?;
    let engine = super::start_engine(config, descriptions.len())?;
    let result = run(&engine, descriptions, args.timeout).await;
    engine.shutdown().await;
    let rows = result?;

    match format {
        OutputFormat::Text => {
            let mut table = Table::new(vec![
                Column::muted("ID"),
                Column::left("QUEUE"),
                Column::right("EXIT"),
                Column::right("TIME"),
                Column::left("COMMAND"),
                Column::status("STATUS"),
            ]);
            for (command, status) in &rows {
                table.row(vec![
                    status.id.to_string(),
                    status.queue.clone(),
                    exit_cell(status),
                    elapsed_cell(status),
                    command.clone(),
                    status.state.to_string(),
                ]);
            }
            table.render(&mut std::io::stdout());
        }
        OutputFormat::Json => {
            let statuses: Vec<_> = rows.iter().map(|(_, status)| status).collect();
            print_json(&statuses)?;
        }
    }

    let failed = rows.iter().filter(|(_, status)| status.state != JobState::Done).count();
    if failed > 0 {
        return Err(ExitError::new(
            1,
            format!("{failed} of {} jobs did not finish successfully", rows.len()),
        )
        .into());
    }
    Ok(())
}

/// Submit everything first so queues can run jobs in parallel, then wait.
async fn run(
    engine: &JobManager,
    descriptions: Vec<JobDescription>,
    timeout: Option<Duration>,
) -> Result<Vec<(String, JobStatus)>> {
    let mut commands = Vec::with_capacity(descriptions.len());
    let mut ids = Vec::with_capacity(descriptions.len());
    for (index, description) in descriptions.into_iter().enumerate() {
        let command = std::iter::once(description.executable.as_str())
            .chain(description.arguments.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ");
        let id = engine
            .submit(description)
            .with_context(|| format!("job #{} ({command}) rejected", index + 1))?;
        tracing::debug!(job = %id, "batch job submitted");
        commands.push(command);
        ids.push(id);
    }
    let statuses = super::wait_all(engine, &ids, timeout).await?;
    Ok(commands.into_iter().zip(statuses).collect())
}

#[cfg(test)]
#[path = "batch_tests.rs"]
mod tests;
