//! `runq queues` specs

use crate::prelude::*;

#[test]
fn lists_builtin_queues() {
    cli()
        .args(&["queues"])
        .env("RUNQ_MULTI_SLOTS", "3")
        .passes()
        .stdout_has("single")
        .stdout_has("bounded(3)")
        .stdout_has("0/3")
        .stdout_has("unbounded");
}

#[test]
fn named_queues_come_from_the_config_file() {
    let temp = Project::empty();
    temp.file(
        "runq.toml",
        "max_history = 10\n\n[queues.gpu]\npolicy = \"bounded\"\nslots = 2\n",
    );
    temp.runq().args(&["--config", "runq.toml", "queues"]).passes().stdout_has("gpu").stdout_has("0/2");
}

#[test]
fn json_lists_every_queue() {
    let run = cli().args(&["queues", "-o", "json"]).passes();
    let queues = run.json();
    let names: Vec<_> =
        queues.as_array().expect("array").iter().map(|q| q["name"].as_str().unwrap_or("")).collect();
    assert_eq!(names, vec!["single", "multi", "unlimited"]);
}

#[test]
fn invalid_config_is_reported() {
    let temp = Project::empty();
    temp.file("runq.toml", "[queues.single]\npolicy = \"unbounded\"\n");
    temp.runq().args(&["--config", "runq.toml", "queues"]).fails().stderr_has("built in");
}

#[test]
fn missing_config_file_is_reported() {
    cli()
        .args(&["--config", "/nonexistent/runq.toml", "queues"])
        .fails()
        .stderr_has("failed to load config");
}
