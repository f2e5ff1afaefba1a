// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Process wrapper: one spawned child, its streams, exit status and termination.

use crate::error::SpawnError;
use crate::resolve::ResolvedCommand;
use parking_lot::Mutex;
use runq_core::{OutputTarget, StdinSource};
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

/// How long to wait after SIGKILL before reporting a process as unkillable.
const KILL_CONFIRM_WAIT: Duration = Duration::from_secs(1);

/// Starts processes for the engine.
///
/// The engine only ever talks to processes through [`ProcessWrapper`];
/// alternative spawners can wrap commands (containers, remote shells) as long
/// as they hand back a live local child.
pub trait Spawner: Send + Sync + 'static {
    fn spawn(&self, command: &ResolvedCommand) -> Result<ProcessWrapper, SpawnError>;
}

/// Spawns children directly on this machine.
///
/// Must be called from within a tokio runtime.
#[derive(Debug, Clone)]
pub struct LocalSpawner {
    max_output_bytes: usize,
    kill_grace: Duration,
}

impl LocalSpawner {
    pub fn new(max_output_bytes: usize, kill_grace: Duration) -> Self {
        Self { max_output_bytes, kill_grace }
    }
}

impl Spawner for LocalSpawner {
    fn spawn(&self, command: &ResolvedCommand) -> Result<ProcessWrapper, SpawnError> {
        ProcessWrapper::start(command, self.max_output_bytes, self.kill_grace)
    }
}

/// How a process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessExit {
    pub code: Option<i32>,
    /// Terminating signal, if the process did not exit on its own.
    pub signal: Option<i32>,
}

impl ProcessExit {
    fn from_status(status: ExitStatus) -> Self {
        #[cfg(unix)]
        let signal = std::os::unix::process::ExitStatusExt::signal(&status);
        #[cfg(not(unix))]
        let signal = None;
        Self { code: status.code(), signal }
    }

    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// Short description such as `exit code 2` or `signal 15`.
    pub fn describe(&self) -> String {
        match (self.code, self.signal) {
            (Some(code), _) => format!("exit code {code}"),
            (None, Some(signal)) => format!("signal {signal}"),
            (None, None) => "unknown exit status".to_string(),
        }
    }
}

/// In-memory sink for a captured stream. Keeps roughly the last
/// `limit` bytes.
#[derive(Debug, Clone)]
pub struct CapturedOutput {
    buf: Arc<Mutex<Vec<u8>>>,
    limit: usize,
}

impl CapturedOutput {
    pub fn new(limit: usize) -> Self {
        Self { buf: Arc::new(Mutex::new(Vec::new())), limit }
    }

    fn append(&self, data: &[u8]) {
        let mut buf = self.buf.lock();
        buf.extend_from_slice(data);
        // Grow to twice the limit before trimming to avoid shifting on every chunk.
        if buf.len() > self.limit.saturating_mul(2) {
            let keep_from = utf8_boundary(&buf, buf.len() - self.limit);
            buf.drain(..keep_from);
        }
    }

    /// Captured text so far, at most `limit` bytes from the tail.
    pub fn text(&self) -> String {
        let buf = self.buf.lock();
        let start = utf8_boundary(&buf, buf.len().saturating_sub(self.limit));
        String::from_utf8_lossy(&buf[start..]).into_owned()
    }
}

/// First index at or after `from` that does not split a UTF-8 sequence.
fn utf8_boundary(data: &[u8], from: usize) -> usize {
    (from..data.len()).find(|&i| (data[i] as i8) >= -64).unwrap_or(data.len())
}

/// Live pipes of an interactive process.
///
/// A field is `Some` only when the job asked for [`StdinSource::Stream`] or
/// [`OutputTarget::Stream`] on that stream.
#[derive(Debug)]
pub struct JobStreams {
    pub stdin: Option<ChildStdin>,
    pub stdout: Option<ChildStdout>,
    pub stderr: Option<ChildStderr>,
}

impl JobStreams {
    fn is_empty(&self) -> bool {
        self.stdin.is_none() && self.stdout.is_none() && self.stderr.is_none()
    }
}

enum ChildState {
    Running(Child),
    Exited { exit: ProcessExit, seen_at: Instant },
}

struct ProcessInner {
    pid: Option<u32>,
    command: String,
    child: Mutex<ChildState>,
    stdout: Option<CapturedOutput>,
    stderr: Option<CapturedOutput>,
    /// Tasks draining captured pipes; finished once each pipe hits EOF.
    readers: Vec<JoinHandle<()>>,
    streams: Mutex<Option<JobStreams>>,
    terminating: AtomicBool,
    kill_grace: Duration,
    runtime: Handle,
}

/// Handle to one running (or finished) child process.
///
/// Cheap to clone; clones refer to the same process. All status checks are
/// non-blocking.
#[derive(Clone)]
pub struct ProcessWrapper {
    inner: Arc<ProcessInner>,
}

impl std::fmt::Debug for ProcessWrapper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessWrapper")
            .field("pid", &self.inner.pid)
            .field("command", &self.inner.command)
            .finish()
    }
}

impl ProcessWrapper {
    /// Spawn `command` with its redirections applied.
    pub fn start(
        command: &ResolvedCommand,
        max_output_bytes: usize,
        kill_grace: Duration,
    ) -> Result<Self, SpawnError> {
        let runtime = Handle::try_current().map_err(|e| SpawnError::Spawn {
            command: command.display(),
            source: std::io::Error::other(e),
        })?;
        let cwd = command.cwd.clone().unwrap_or_else(|| PathBuf::from("."));

        let mut cmd = Command::new(&command.program);
        cmd.args(&command.args).envs(&command.env);
        if let Some(dir) = &command.cwd {
            cmd.current_dir(dir);
        }
        // Own process group so termination also reaches grandchildren.
        #[cfg(unix)]
        cmd.process_group(0);

        apply_stdin(&mut cmd, &command.stdin, &cwd)?;
        apply_output(&mut cmd, 1, &command.stdout, &cwd)?;
        apply_output(&mut cmd, 2, &command.stderr, &cwd)?;

        let mut child = cmd.spawn().map_err(|source| SpawnError::Spawn {
            command: command.display(),
            source,
        })?;

        let mut streams = JobStreams { stdin: None, stdout: None, stderr: None };
        match (&command.stdin, child.stdin.take()) {
            (StdinSource::Text(text), Some(mut stdin)) => {
                let data = text.clone().into_bytes();
                runtime.spawn(async move {
                    if let Err(e) = stdin.write_all(&data).await {
                        tracing::debug!(error = %e, "stdin closed before all input was written");
                    }
                });
            }
            (_, pipe) => streams.stdin = pipe,
        }

        let mut readers = Vec::new();
        let stdout = match (&command.stdout, child.stdout.take()) {
            (OutputTarget::Capture, Some(pipe)) => {
                Some(capture(&runtime, pipe, max_output_bytes, &mut readers))
            }
            (_, pipe) => {
                streams.stdout = pipe;
                None
            }
        };
        let stderr = match (&command.stderr, child.stderr.take()) {
            (OutputTarget::Capture, Some(pipe)) => {
                Some(capture(&runtime, pipe, max_output_bytes, &mut readers))
            }
            (_, pipe) => {
                streams.stderr = pipe;
                None
            }
        };

        Ok(Self {
            inner: Arc::new(ProcessInner {
                pid: child.id(),
                command: command.display(),
                child: Mutex::new(ChildState::Running(child)),
                stdout,
                stderr,
                readers,
                streams: Mutex::new((!streams.is_empty()).then_some(streams)),
                terminating: AtomicBool::new(false),
                kill_grace,
                runtime,
            }),
        })
    }

    pub fn pid(&self) -> Option<u32> {
        self.inner.pid
    }

    pub fn command(&self) -> &str {
        &self.inner.command
    }

    /// Non-blocking exit check. `Ok(None)` while the process is alive.
    pub fn try_exit(&self) -> std::io::Result<Option<ProcessExit>> {
        let mut state = self.inner.child.lock();
        match &mut *state {
            ChildState::Exited { exit, .. } => Ok(Some(*exit)),
            ChildState::Running(child) => match child.try_wait()? {
                Some(status) => {
                    let exit = ProcessExit::from_status(status);
                    *state = ChildState::Exited { exit, seen_at: Instant::now() };
                    Ok(Some(exit))
                }
                None => Ok(None),
            },
        }
    }

    /// Exit status once the process has exited and its captured output is
    /// complete.
    ///
    /// A surviving grandchild can hold the capture pipes open; after
    /// `drain_wait` has passed since the exit was first seen the status is
    /// returned anyway, with whatever output arrived by then.
    pub fn try_settle(&self, drain_wait: Duration) -> std::io::Result<Option<ProcessExit>> {
        let Some(exit) = self.try_exit()? else {
            return Ok(None);
        };
        if self.output_drained() {
            return Ok(Some(exit));
        }
        let exited_for = match &*self.inner.child.lock() {
            ChildState::Exited { seen_at, .. } => seen_at.elapsed(),
            ChildState::Running(_) => Duration::ZERO,
        };
        Ok((exited_for >= drain_wait).then_some(exit))
    }

    /// Whether every captured stream has reached end of file.
    pub fn output_drained(&self) -> bool {
        self.inner.readers.iter().all(JoinHandle::is_finished)
    }

    pub fn is_alive(&self) -> bool {
        matches!(self.try_exit(), Ok(None))
    }

    /// Exit code once the process has been observed to exit.
    pub fn exit_code(&self) -> Option<i32> {
        match &*self.inner.child.lock() {
            ChildState::Exited { exit, .. } => exit.code,
            ChildState::Running(_) => None,
        }
    }

    pub fn stdout(&self) -> Option<CapturedOutput> {
        self.inner.stdout.clone()
    }

    pub fn stderr(&self) -> Option<CapturedOutput> {
        self.inner.stderr.clone()
    }

    /// Hand out the live pipes. `None` when the process has no streamed
    /// pipes or they were already taken.
    pub fn take_streams(&self) -> Option<JobStreams> {
        self.inner.streams.lock().take()
    }

    /// Whether [`terminate`](Self::terminate) has been called.
    pub fn is_terminating(&self) -> bool {
        self.inner.terminating.load(Ordering::SeqCst)
    }

    /// Ask the process to stop: SIGTERM now, SIGKILL after the kill grace
    /// period. Returns immediately; repeated calls are no-ops.
    pub fn terminate(&self) {
        if self.inner.terminating.swap(true, Ordering::SeqCst) || !self.is_alive() {
            return;
        }
        if !self.signal_group(GroupSignal::Term) {
            self.destroy();
            return;
        }
        let process = self.clone();
        let grace = self.inner.kill_grace;
        self.inner.runtime.spawn(async move {
            tokio::time::sleep(grace).await;
            if !process.is_alive() {
                return;
            }
            tracing::warn!(
                pid = ?process.pid(),
                command = process.command(),
                "process ignored SIGTERM, sending SIGKILL"
            );
            process.force_kill();
            tokio::time::sleep(KILL_CONFIRM_WAIT).await;
            if process.is_alive() {
                tracing::warn!(pid = ?process.pid(), "process still alive after SIGKILL");
            }
        });
    }

    /// SIGKILL the process group, falling back to the runtime's kill.
    pub fn force_kill(&self) {
        self.inner.terminating.store(true, Ordering::SeqCst);
        if !self.is_alive() {
            return;
        }
        if !self.signal_group(GroupSignal::Kill) {
            self.destroy();
        }
    }

    fn destroy(&self) {
        if let ChildState::Running(child) = &mut *self.inner.child.lock() {
            if let Err(e) = child.start_kill() {
                tracing::warn!(pid = ?self.inner.pid, error = %e, "failed to kill process");
            }
        }
    }

    #[cfg(unix)]
    fn signal_group(&self, signal: GroupSignal) -> bool {
        use nix::sys::signal::{killpg, Signal};
        use nix::unistd::Pid;

        let Some(pid) = self.inner.pid else {
            return false;
        };
        let signal = match signal {
            GroupSignal::Term => Signal::SIGTERM,
            GroupSignal::Kill => Signal::SIGKILL,
        };
        match killpg(Pid::from_raw(pid as i32), signal) {
            Ok(()) => true,
            Err(e) => {
                tracing::debug!(pid, ?signal, error = %e, "killpg failed");
                false
            }
        }
    }

    #[cfg(not(unix))]
    fn signal_group(&self, _signal: GroupSignal) -> bool {
        false
    }
}

#[derive(Debug, Clone, Copy)]
enum GroupSignal {
    Term,
    Kill,
}

fn capture<R>(
    runtime: &Handle,
    mut pipe: R,
    limit: usize,
    readers: &mut Vec<JoinHandle<()>>,
) -> CapturedOutput
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let output = CapturedOutput::new(limit);
    let sink = output.clone();
    let reader = runtime.spawn(async move {
        let mut chunk = [0u8; 8192];
        loop {
            match pipe.read(&mut chunk).await {
                Ok(0) => break,
                Ok(n) => sink.append(&chunk[..n]),
                Err(e) => {
                    tracing::debug!(error = %e, "output capture stopped");
                    break;
                }
            }
        }
    });
    readers.push(reader);
    output
}

fn apply_stdin(cmd: &mut Command, source: &StdinSource, cwd: &Path) -> Result<(), SpawnError> {
    match source {
        StdinSource::Null => {
            cmd.stdin(Stdio::null());
        }
        StdinSource::File(path) => {
            cmd.stdin(Stdio::from(open_read(path, cwd)?));
        }
        StdinSource::Text(_) | StdinSource::Stream => {
            cmd.stdin(Stdio::piped());
        }
    }
    Ok(())
}

fn apply_output(
    cmd: &mut Command,
    fd: u32,
    target: &OutputTarget,
    cwd: &Path,
) -> Result<(), SpawnError> {
    let stdio = match target {
        OutputTarget::Discard => Stdio::null(),
        OutputTarget::File { path, append } => Stdio::from(open_write(path, *append, cwd)?),
        OutputTarget::Capture | OutputTarget::Stream => Stdio::piped(),
    };
    match fd {
        1 => cmd.stdout(stdio),
        _ => cmd.stderr(stdio),
    };
    Ok(())
}

/// Resolve a path relative to cwd if it's not absolute.
fn resolve_path(path: &Path, cwd: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        cwd.join(path)
    }
}

fn open_read(path: &Path, cwd: &Path) -> Result<File, SpawnError> {
    File::open(resolve_path(path, cwd)).map_err(|source| SpawnError::Redirect {
        message: format!("cannot open '{}' for reading", path.display()),
        source,
    })
}

fn open_write(path: &Path, append: bool, cwd: &Path) -> Result<File, SpawnError> {
    OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(!append)
        .append(append)
        .open(resolve_path(path, cwd))
        .map_err(|source| SpawnError::Redirect {
            message: format!(
                "cannot open '{}' for {}",
                path.display(),
                if append { "appending" } else { "writing" }
            ),
            source,
        })
}

#[cfg(test)]
#[path = "process_tests.rs"]
mod tests;
