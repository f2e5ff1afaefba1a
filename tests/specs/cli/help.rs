//! CLI help output specs

use crate::prelude::*;

#[test]
fn runq_no_args_shows_usage() {
    cli().fails().stderr_has("Usage:");
}

#[test]
fn runq_help_lists_commands() {
    cli()
        .args(&["--help"])
        .passes()
        .stdout_has("Usage:")
        .stdout_has("run")
        .stdout_has("batch")
        .stdout_has("queues");
}

#[test]
fn runq_run_help_shows_options() {
    cli()
        .args(&["run", "--help"])
        .passes()
        .stdout_has("--capture")
        .stdout_has("--timeout")
        .stdout_has("--queue");
}

#[test]
fn runq_version_shows_version() {
    cli().args(&["--version"]).passes().stdout_has("0.2");
}

#[test]
fn unknown_subcommand_fails() {
    cli().args(&["frobnicate"]).fails().stderr_has("frobnicate");
}
