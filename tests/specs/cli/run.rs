//! `runq run` specs: one job through a queue, exit code mirrors the job.

use crate::prelude::*;

#[test]
fn captured_output_is_printed() {
    cli()
        .args(&["run", "--capture", "--", "echo", "hello"])
        .passes()
        .stdout_eq("hello\n")
        .stderr_has("job-1 done");
}

#[test]
fn output_is_discarded_without_capture() {
    cli().args(&["run", "--", "echo", "hello"]).passes().stdout_lacks("hello");
}

#[test]
fn exit_code_is_passed_through() {
    cli()
        .args(&["run", "--", "sh", "-c", "exit 3"])
        .exits(3)
        .stderr_has("error: exit failure: exit code 3");
}

#[test]
fn missing_executable_is_a_spawn_failure() {
    cli()
        .args(&["run", "--", "/nonexistent/runq-spec-binary"])
        .exits(1)
        .stderr_has("spawn failure");
}

#[test]
fn timeout_kills_the_job() {
    cli()
        .args(&["run", "--timeout", "1s", "--", "sleep", "30"])
        .env("RUNQ_KILL_GRACE_MS", "200")
        .exits(130)
        .stderr_has("killed");
}

#[test]
fn zero_history_still_reports_the_job() {
    cli()
        .args(&["run", "--capture", "--", "echo", "kept"])
        .env("RUNQ_MAX_HISTORY", "0")
        .passes()
        .stdout_eq("kept\n")
        .stderr_has("job-1 done");
}

#[test]
fn unknown_queue_is_rejected() {
    cli().args(&["run", "--queue", "ghost", "--", "true"]).fails().stderr_has("unknown queue: ghost");
}

#[test]
fn json_output_reports_status() {
    let run = cli().args(&["-o", "json", "run", "--", "true"]).passes();
    let status = run.json();
    assert_eq!(status["id"], "job-1");
    assert_eq!(status["queue"], "single");
    assert_eq!(status["state"], "done");
    assert_eq!(status["exit_code"], 0);
}

#[test]
fn working_directory_and_environment_are_applied() {
    let temp = Project::empty();
    temp.file("marker.txt", "here");
    temp.runq()
        .args(&["run", "--capture", "-e", "GREETING=hi", "--", "sh", "-c", "cat marker.txt; echo $GREETING"])
        .passes()
        .stdout_eq("herehi\n");

    let dir = temp.path().to_string_lossy().to_string();
    cli().args(&["run", "--capture", "-C", &dir, "--", "cat", "marker.txt"]).passes().stdout_eq("here");
}

#[test]
fn stderr_is_captured_separately() {
    cli()
        .args(&["run", "--capture", "--", "sh", "-c", "echo oops >&2; exit 1"])
        .exits(1)
        .stdout_eq("")
        .stderr_has("oops");
}

#[test]
fn named_queue_from_config_file() {
    let temp = Project::empty();
    temp.file("runq.toml", "[queues.serial]\npolicy = \"single\"\n");
    temp.runq()
        .args(&["--config", "runq.toml", "-o", "json", "run", "--queue", "serial", "--", "true"])
        .passes()
        .stdout_has("\"queue\": \"serial\"");
}
