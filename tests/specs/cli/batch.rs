//! `runq batch` specs: many jobs from a TOML file.

use crate::prelude::*;

const PASSING: &str = r#"
[[job]]
executable = "true"

[[job]]
executable = "sh"
arguments = ["-c", "echo one >> out.log"]
queue = "multi"

[[job]]
executable = "sh"
arguments = ["-c", "echo two >> out.log"]
queue = "unlimited"
"#;

const ONE_FAILING: &str = r#"
[[job]]
executable = "true"

[[job]]
executable = "sh"
arguments = ["-c", "exit 4"]
"#;

#[test]
fn all_jobs_succeed() {
    let temp = Project::empty();
    temp.file("batch.toml", PASSING);
    temp.runq()
        .args(&["batch", "batch.toml"])
        .passes()
        .stdout_has("STATUS")
        .stdout_has("job-1")
        .stdout_has("job-3")
        .stdout_has("unlimited");

    let log = temp.read("out.log");
    assert!(log.contains("one") && log.contains("two"), "{log}");
}

#[test]
fn a_failing_job_fails_the_batch() {
    let temp = Project::empty();
    temp.file("batch.toml", ONE_FAILING);
    temp.runq()
        .args(&["batch", "batch.toml"])
        .exits(1)
        .stdout_has("error")
        .stderr_has("1 of 2 jobs did not finish successfully");
}

#[test]
fn json_output_lists_every_job() {
    let temp = Project::empty();
    temp.file("batch.toml", ONE_FAILING);
    let run = temp.runq().args(&["-o", "json", "batch", "batch.toml"]).exits(1);
    let statuses = run.json();
    let statuses = statuses.as_array().expect("array");
    assert_eq!(statuses.len(), 2);
    assert_eq!(statuses[0]["state"], "done");
    assert_eq!(statuses[1]["state"], "error");
    assert_eq!(statuses[1]["exit_code"], 4);
}

#[test]
fn invalid_batch_file_is_rejected() {
    let temp = Project::empty();
    temp.file("batch.toml", "[[job]]\nprogram = \"true\"\n");
    temp.runq().args(&["batch", "batch.toml"]).fails().stderr_has("invalid batch file");
}

#[test]
fn unknown_queue_in_batch_is_rejected() {
    let temp = Project::empty();
    temp.file("batch.toml", "[[job]]\nexecutable = \"true\"\nqueue = \"ghost\"\n");
    temp.runq()
        .args(&["batch", "batch.toml"])
        .fails()
        .stderr_has("job #1 (true) rejected")
        .stderr_has("unknown queue: ghost");
}

#[test]
fn history_smaller_than_the_batch_still_lists_every_job() {
    let temp = Project::empty();
    temp.file("batch.toml", PASSING);
    temp.runq()
        .args(&["batch", "batch.toml"])
        .env("RUNQ_MAX_HISTORY", "1")
        .passes()
        .stdout_has("job-1")
        .stdout_has("job-2")
        .stdout_has("job-3");
}
