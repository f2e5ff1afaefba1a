// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! runq: run commands through local job queues

mod color;
mod commands;
mod exit_error;
mod output;
mod table;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use commands::{batch, queues, run};
use exit_error::ExitError;
use output::OutputFormat;

#[derive(Parser)]
#[command(name = "runq", version, about = "Run commands through local job queues")]
#[command(styles = color::styles())]
struct Cli {
    /// Engine configuration file (TOML); RUNQ_* variables override it
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Output format
    #[arg(short = 'o', long = "output", value_enum, default_value_t = OutputFormat::Text, global = true)]
    output: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one command and exit with its exit code
    Run(run::RunArgs),
    /// Run every job of a TOML batch file
    Batch(batch::BatchArgs),
    /// List the configured queues
    Queues,
}

fn init_logging() {
    let filter = EnvFilter::try_from_env("RUNQ_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn dispatch(cli: Cli) -> Result<()> {
    let config = commands::load_config(cli.config.as_deref())?;
    match cli.command {
        Commands::Run(args) => run::handle(args, config, cli.output).await,
        Commands::Batch(args) => batch::handle(args, config, cli.output).await,
        Commands::Queues => queues::handle(config, cli.output).await,
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging();

    if let Err(e) = dispatch(cli).await {
        let code = match e.downcast_ref::<ExitError>() {
            Some(exit) => {
                if !exit.message.is_empty() {
                    eprintln!("{}", exit.message);
                }
                exit.code
            }
            None => {
                eprintln!("error: {e:#}");
                1
            }
        };
        std::process::exit(code);
    }
}
