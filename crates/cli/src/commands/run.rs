// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `runq run`: run one command through a queue and wait for it.

use anyhow::{Context, Result};
use clap::Args;
use runq_core::{EngineConfig, JobDescription, JobStatus, OutputTarget, SINGLE_QUEUE};
use runq_engine::JobManager;
use std::path::PathBuf;
use std::time::Duration;

use crate::exit_error::ExitError;
use crate::output::{print_json, summary_line, OutputFormat};

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Queue to submit to
    #[arg(short, long, default_value = SINGLE_QUEUE)]
    pub queue: String,
    /// Capture stdout and stderr and print them once the job finishes
    #[arg(long)]
    pub capture: bool,
    /// Cancel the job if it runs longer than this (e.g. 30s, 5m)
    #[arg(long, value_name = "DURATION", value_parser = super::parse_duration)]
    pub timeout: Option<Duration>,
    /// Working directory of the job
    #[arg(short = 'C', long, value_name = "DIR")]
    pub dir: Option<PathBuf>,
    /// Environment override (repeatable: -e KEY=VALUE)
    #[arg(short, long = "env", value_name = "KEY=VALUE", value_parser = super::parse_key_value)]
    pub env: Vec<(String, String)>,
    /// Command and arguments
    #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
    pub command: Vec<String>,
}

impl RunArgs {
    pub fn description(&self) -> Result<JobDescription> {
        let (program, args) =
            self.command.split_first().context("no command given")?;
        let mut description =
            JobDescription::new(program.as_str()).arguments(args.to_vec()).queue(&self.queue);
        if let Some(dir) = &self.dir {
            description = description.working_dir(dir.clone());
        }
        for (key, value) in &self.env {
            description = description.env(key, value);
        }
        if self.capture {
            description = description.stdout(OutputTarget::Capture).stderr(OutputTarget::Capture);
        }
        Ok(description)
    }
}

pub async fn handle(args: RunArgs, config: EngineConfig, format: OutputFormat) -> Result<()> {
    let description = args.description()?;
    let engine = super::start_engine(config, 1)?;
    let result = run(&engine, description, args.timeout).await;
    engine.shutdown().await;
    let status = result?;

    match format {
        OutputFormat::Text => {
            if let Some(stdout) = &status.stdout {
                print!("{stdout}");
            }
            if let Some(stderr) = &status.stderr {
                eprint!("{stderr}");
            }
            eprintln!("{}", summary_line(&status));
        }
        OutputFormat::Json => print_json(&status)?,
    }

    match ExitError::for_job(&status) {
        Some(exit) => Err(exit.into()),
        None => Ok(()),
    }
}

async fn run(
    engine: &JobManager,
    description: JobDescription,
    timeout: Option<Duration>,
) -> Result<JobStatus> {
    let id = engine.submit(description)?;
    let mut statuses = super::wait_all(engine, std::slice::from_ref(&id), timeout).await?;
    statuses.pop().with_context(|| format!("no status for {id}"))
}

#[cfg(test)]
#[path = "run_tests.rs"]
mod tests;
