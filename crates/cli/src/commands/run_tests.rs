// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use clap::Parser;

#[derive(Parser)]
struct Cli {
    #[command(flatten)]
    run: RunArgs,
}

fn parse(args: &[&str]) -> RunArgs {
    Cli::try_parse_from(std::iter::once("run").chain(args.iter().copied())).unwrap().run
}

#[test]
fn builds_description_from_arguments() {
    let args = parse(&["--queue", "multi", "-C", "/tmp", "-e", "A=1", "--", "ls", "-la", "x"]);
    let description = args.description().unwrap();
    assert_eq!(description.executable, "ls");
    assert_eq!(description.arguments, vec!["-la", "x"]);
    assert_eq!(description.queue, "multi");
    assert_eq!(description.working_dir, Some(PathBuf::from("/tmp")));
    assert_eq!(description.environment.get("A").map(String::as_str), Some("1"));
    assert_eq!(description.stdout, OutputTarget::Discard);
}

#[test]
fn defaults_to_single_queue() {
    let description = parse(&["true"]).description().unwrap();
    assert_eq!(description.queue, "single");
    assert!(description.arguments.is_empty());
}

#[test]
fn capture_applies_to_both_streams() {
    let description = parse(&["--capture", "echo", "hi"]).description().unwrap();
    assert_eq!(description.stdout, OutputTarget::Capture);
    assert_eq!(description.stderr, OutputTarget::Capture);
}

#[test]
fn trailing_hyphen_arguments_belong_to_the_command() {
    let args = parse(&["sh", "-c", "exit 3"]);
    assert_eq!(args.command, vec!["sh", "-c", "exit 3"]);
}

#[test]
fn timeout_accepts_units() {
    let args = parse(&["--timeout", "2m", "sleep", "600"]);
    assert_eq!(args.timeout, Some(Duration::from_secs(120)));
}

#[test]
fn command_is_required() {
    assert!(Cli::try_parse_from(["run", "--capture"]).is_err());
}

#[tokio::test]
async fn zero_history_still_reports_the_job() {
    let config = EngineConfig::default().max_history(0).poll_interval(Duration::from_millis(20));
    let engine = crate::commands::start_engine(config, 1).unwrap();
    let description = parse(&["--capture", "sh", "-c", "echo done"]).description().unwrap();

    let status = run(&engine, description, None).await.unwrap();
    engine.shutdown().await;

    assert!(status.is_done());
    assert_eq!(status.stdout.as_deref(), Some("done\n"));
}
