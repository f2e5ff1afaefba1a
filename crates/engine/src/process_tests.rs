// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use indexmap::IndexMap;
use std::time::Instant;

fn command(program: &str, args: &[&str]) -> ResolvedCommand {
    ResolvedCommand {
        program: program.to_string(),
        args: args.iter().map(|s| s.to_string()).collect(),
        cwd: None,
        env: IndexMap::new(),
        stdin: StdinSource::Null,
        stdout: OutputTarget::Discard,
        stderr: OutputTarget::Discard,
    }
}

fn spawn(cmd: &ResolvedCommand) -> ProcessWrapper {
    LocalSpawner::new(1024 * 1024, Duration::from_millis(200)).spawn(cmd).unwrap()
}

async fn wait_exit(process: &ProcessWrapper) -> ProcessExit {
    let deadline = Instant::now() + Duration::from_secs(10);
    loop {
        if let Some(exit) = process.try_exit().unwrap() {
            return exit;
        }
        assert!(Instant::now() < deadline, "process did not exit in time");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

async fn wait_settled(process: &ProcessWrapper, drain_wait: Duration) -> ProcessExit {
    let deadline = Instant::now() + Duration::from_secs(10);
    loop {
        if let Some(exit) = process.try_settle(drain_wait).unwrap() {
            return exit;
        }
        assert!(Instant::now() < deadline, "process did not settle in time");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// Captured output arrives asynchronously; wait until it stops changing.
async fn captured(output: &CapturedOutput, expected: &str) -> String {
    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        let text = output.text();
        if text == expected || Instant::now() >= deadline {
            return text;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

#[tokio::test]
async fn true_exits_zero() {
    let process = spawn(&command("true", &[]));
    assert!(process.pid().is_some());
    let exit = wait_exit(&process).await;
    assert!(exit.success());
    assert_eq!(process.exit_code(), Some(0));
    assert!(!process.is_alive());
}

#[tokio::test]
async fn false_exits_non_zero() {
    let exit = wait_exit(&spawn(&command("false", &[]))).await;
    assert_eq!(exit.code, Some(1));
    assert_eq!(exit.describe(), "exit code 1");
}

#[tokio::test]
async fn missing_executable_is_spawn_error() {
    let err = LocalSpawner::new(1024, Duration::from_millis(10))
        .spawn(&command("/definitely/not/here", &[]))
        .unwrap_err();
    assert!(matches!(err, SpawnError::Spawn { ref command, .. } if command == "/definitely/not/here"));
}

#[tokio::test]
async fn missing_stdin_file_is_redirect_error() {
    let mut cmd = command("cat", &[]);
    cmd.stdin = StdinSource::File("/no/such/input".into());
    let err = LocalSpawner::new(1024, Duration::from_millis(10)).spawn(&cmd).unwrap_err();
    assert!(matches!(err, SpawnError::Redirect { .. }));
}

#[tokio::test]
async fn captures_stdout_and_stderr_separately() {
    let mut cmd = command("sh", &["-c", "echo out; echo err >&2"]);
    cmd.stdout = OutputTarget::Capture;
    cmd.stderr = OutputTarget::Capture;
    let process = spawn(&cmd);
    wait_exit(&process).await;
    let stdout = process.stdout().unwrap();
    let stderr = process.stderr().unwrap();
    assert_eq!(captured(&stdout, "out\n").await, "out\n");
    assert_eq!(captured(&stderr, "err\n").await, "err\n");
}

#[tokio::test]
async fn discarded_streams_have_no_capture() {
    let process = spawn(&command("true", &[]));
    assert!(process.stdout().is_none());
    assert!(process.stderr().is_none());
}

#[tokio::test]
async fn stdin_text_is_fed_to_child() {
    let mut cmd = command("cat", &[]);
    cmd.stdin = StdinSource::Text("piped input".into());
    cmd.stdout = OutputTarget::Capture;
    let process = spawn(&cmd);
    assert!(wait_exit(&process).await.success());
    assert_eq!(captured(&process.stdout().unwrap(), "piped input").await, "piped input");
}

#[tokio::test]
async fn settled_process_has_complete_capture() {
    let mut cmd = command("seq", &["1", "20000"]);
    cmd.stdout = OutputTarget::Capture;
    let process = spawn(&cmd);
    assert!(wait_settled(&process, Duration::from_secs(5)).await.success());
    assert!(process.output_drained());
    let text = process.stdout().unwrap().text();
    assert!(text.starts_with("1\n2\n"));
    assert!(text.ends_with("19999\n20000\n"));
}

#[tokio::test]
async fn settles_after_drain_wait_when_a_grandchild_holds_the_pipe() {
    let mut cmd = command("sh", &["-c", "sleep 3 & echo started"]);
    cmd.stdout = OutputTarget::Capture;
    let process = spawn(&cmd);
    let started = Instant::now();
    assert!(wait_settled(&process, Duration::from_millis(100)).await.success());
    assert!(started.elapsed() < Duration::from_secs(2));
    assert!(!process.output_drained());
}

#[tokio::test]
async fn streamed_pipes_are_handed_out_once() {
    let mut cmd = command("cat", &[]);
    cmd.stdin = StdinSource::Stream;
    cmd.stdout = OutputTarget::Stream;
    let process = spawn(&cmd);
    let mut streams = process.take_streams().unwrap();
    assert!(process.take_streams().is_none());
    assert!(streams.stderr.is_none());

    let mut stdin = streams.stdin.take().unwrap();
    stdin.write_all(b"echoed\n").await.unwrap();
    drop(stdin);
    let mut out = String::new();
    streams.stdout.take().unwrap().read_to_string(&mut out).await.unwrap();
    assert_eq!(out, "echoed\n");
    assert!(wait_exit(&process).await.success());
}

#[tokio::test]
async fn non_interactive_process_has_no_streams() {
    let mut cmd = command("true", &[]);
    cmd.stdout = OutputTarget::Capture;
    assert!(spawn(&cmd).take_streams().is_none());
}

#[tokio::test]
async fn env_and_cwd_are_applied() {
    let dir = tempfile::tempdir().unwrap();
    let cwd = dir.path().canonicalize().unwrap();
    let mut cmd = command("sh", &["-c", "echo \"$RUNQ_TEST_VAR\"; pwd"]);
    cmd.env.insert("RUNQ_TEST_VAR".into(), "value".into());
    cmd.cwd = Some(cwd.clone());
    cmd.stdout = OutputTarget::Capture;
    let process = spawn(&cmd);
    wait_exit(&process).await;
    let expected = format!("value\n{}\n", cwd.display());
    assert_eq!(captured(&process.stdout().unwrap(), &expected).await, expected);
}

#[tokio::test]
async fn file_outputs_resolve_relative_to_cwd() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("log.txt"), "first\n").unwrap();
    let mut cmd = command("sh", &["-c", "echo second; echo oops >&2"]);
    cmd.cwd = Some(dir.path().to_path_buf());
    cmd.stdout = OutputTarget::File { path: "log.txt".into(), append: true };
    cmd.stderr = OutputTarget::file("err.txt");
    let process = spawn(&cmd);
    wait_exit(&process).await;
    assert_eq!(std::fs::read_to_string(dir.path().join("log.txt")).unwrap(), "first\nsecond\n");
    assert_eq!(std::fs::read_to_string(dir.path().join("err.txt")).unwrap(), "oops\n");
}

#[tokio::test]
async fn terminate_stops_sleeping_process() {
    let process = spawn(&command("sleep", &["30"]));
    assert!(process.is_alive());
    process.terminate();
    assert!(process.is_terminating());
    let exit = wait_exit(&process).await;
    assert_eq!(exit.code, None);
    assert_eq!(exit.signal, Some(15));
}

#[tokio::test]
async fn terminate_escalates_when_sigterm_is_ignored() {
    let process = spawn(&command("sh", &["-c", "trap '' TERM; sleep 30"]));
    // Let the shell install its trap before signalling.
    tokio::time::sleep(Duration::from_millis(200)).await;
    process.terminate();
    let exit = wait_exit(&process).await;
    assert_eq!(exit.signal, Some(9));
}

#[tokio::test]
async fn terminate_twice_is_harmless() {
    let process = spawn(&command("sleep", &["30"]));
    process.terminate();
    process.terminate();
    assert_eq!(wait_exit(&process).await.signal, Some(15));
}

#[tokio::test]
async fn force_kill_is_immediate() {
    let process = spawn(&command("sleep", &["30"]));
    process.force_kill();
    assert_eq!(wait_exit(&process).await.signal, Some(9));
}

#[tokio::test]
async fn terminate_after_exit_is_noop() {
    let process = spawn(&command("true", &[]));
    wait_exit(&process).await;
    process.terminate();
    process.force_kill();
    assert_eq!(process.exit_code(), Some(0));
}

#[test]
fn captured_output_keeps_tail() {
    let output = CapturedOutput::new(4);
    output.append(b"abcdefghij");
    assert_eq!(output.text(), "ghij");
    output.append(b"kl");
    assert_eq!(output.text(), "ijkl");
}

#[test]
fn captured_output_does_not_split_utf8() {
    let output = CapturedOutput::new(4);
    output.append("aé€".as_bytes());
    // The last four bytes start inside 'é'; the partial character is dropped.
    assert_eq!(output.text(), "€");
}

#[yare::parameterized(
    code_wins    = { Some(2), Some(15), "exit code 2" },
    code_only    = { Some(0), None,     "exit code 0" },
    signal_only  = { None,    Some(9),  "signal 9" },
    neither      = { None,    None,     "unknown exit status" },
)]
fn exit_describe_variants(code: Option<i32>, signal: Option<i32>, expected: &str) {
    assert_eq!(ProcessExit { code, signal }.describe(), expected);
}
