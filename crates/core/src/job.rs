// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job descriptions, lifecycle states and status snapshots.

use crate::queue::SINGLE_QUEUE;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

crate::define_id! {
    /// Unique identifier for a submitted job.
    ///
    /// Assigned by the engine at submission time. Ids issued by one engine
    /// never repeat, so a stale id can only ever resolve to its own job or
    /// to nothing.
    pub struct JobId("job-");
}

/// Lifecycle state of a job.
///
/// `Pending -> Running -> {Done, Error, Killed}`. A pending job may also go
/// straight to `Killed` (cancelled before it ran) or `Error` (its process
/// could not be spawned). Terminal states are final.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Pending,
    Running,
    Done,
    Error,
    Killed,
}

impl JobState {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobState::Done | JobState::Error | JobState::Killed)
    }

    /// Whether the state machine permits moving from `self` to `next`.
    pub fn can_transition_to(self, next: JobState) -> bool {
        match (self, next) {
            (JobState::Pending, JobState::Running) => true,
            (JobState::Pending, JobState::Error | JobState::Killed) => true,
            (JobState::Running, next) => next.is_terminal(),
            _ => false,
        }
    }
}

crate::simple_display! {
    JobState {
        Pending => "pending",
        Running => "running",
        Done => "done",
        Error => "error",
        Killed => "killed",
    }
}

/// Where a job's standard input comes from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StdinSource {
    /// `/dev/null`
    #[default]
    Null,
    /// Read from a file, relative paths resolved against the working directory.
    File(PathBuf),
    /// Fed from memory, then closed.
    Text(String),
    /// Left open as a pipe the caller writes to; see `JobManager::streams`.
    Stream,
}

/// Where a job's stdout or stderr goes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputTarget {
    #[default]
    Discard,
    /// Write to a file, relative paths resolved against the working directory.
    File {
        path: PathBuf,
        #[serde(default)]
        append: bool,
    },
    /// Keep the (tail of the) output in memory; exposed through [`JobStatus`].
    Capture,
    /// Left open as a pipe the caller reads live.
    Stream,
}

impl OutputTarget {
    pub fn file(path: impl Into<PathBuf>) -> Self {
        OutputTarget::File { path: path.into(), append: false }
    }
}

fn default_queue() -> String {
    SINGLE_QUEUE.to_string()
}

/// A request to run one process. Immutable once submitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JobDescription {
    pub executable: String,
    #[serde(default)]
    pub arguments: Vec<String>,
    /// Defaults to the working directory of the engine process.
    #[serde(default)]
    pub working_dir: Option<PathBuf>,
    /// Merged on top of the inherited environment.
    #[serde(default)]
    pub environment: IndexMap<String, String>,
    #[serde(default)]
    pub stdin: StdinSource,
    #[serde(default)]
    pub stdout: OutputTarget,
    #[serde(default)]
    pub stderr: OutputTarget,
    #[serde(default = "default_queue")]
    pub queue: String,
    /// Requested slots. Accepted for compatibility with batch back-ends;
    /// local queues always charge one slot per job.
    #[serde(default)]
    pub slots: Option<u32>,
}

impl JobDescription {
    pub fn new(executable: impl Into<String>) -> Self {
        Self {
            executable: executable.into(),
            arguments: Vec::new(),
            working_dir: None,
            environment: IndexMap::new(),
            stdin: StdinSource::Null,
            stdout: OutputTarget::Discard,
            stderr: OutputTarget::Discard,
            queue: default_queue(),
            slots: None,
        }
    }

    crate::setters! {
        into { queue: String }
        set {
            arguments: Vec<String>,
            stdin: StdinSource,
            stdout: OutputTarget,
            stderr: OutputTarget,
        }
        option { working_dir: PathBuf, slots: u32 }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.arguments.push(arg.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.environment.insert(key.into(), value.into());
        self
    }

    /// Whether any standard stream is handed to the caller while the job runs.
    pub fn is_interactive(&self) -> bool {
        self.stdin == StdinSource::Stream
            || self.stdout == OutputTarget::Stream
            || self.stderr == OutputTarget::Stream
    }

    /// Reject descriptions no back-end could run.
    pub fn validate(&self) -> Result<(), DescriptionError> {
        if self.executable.trim().is_empty() {
            return Err(DescriptionError::EmptyExecutable);
        }
        if self.executable.contains('\0') {
            return Err(DescriptionError::NulByte { field: "executable".to_string() });
        }
        if let Some(i) = self.arguments.iter().position(|a| a.contains('\0')) {
            return Err(DescriptionError::NulByte { field: format!("arguments[{i}]") });
        }
        for (key, value) in &self.environment {
            if key.is_empty() || key.contains('=') || key.contains('\0') {
                return Err(DescriptionError::InvalidEnvKey(key.clone()));
            }
            if value.contains('\0') {
                return Err(DescriptionError::NulByte { field: format!("environment[{key}]") });
            }
        }
        if self.slots == Some(0) {
            return Err(DescriptionError::ZeroSlots);
        }
        Ok(())
    }
}

/// Why a [`JobDescription`] was rejected.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DescriptionError {
    #[error("executable is empty")]
    EmptyExecutable,
    #[error("{field} contains a NUL byte")]
    NulByte { field: String },
    #[error("invalid environment variable name '{0}'")]
    InvalidEnvKey(String),
    #[error("slots must be at least 1")]
    ZeroSlots,
}

/// Category of a per-job failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobErrorKind {
    /// The process could not be started.
    SpawnFailure,
    /// The process exited with a non-zero code or was killed by an outside signal.
    ExitFailure,
    /// The job was cancelled.
    Killed,
    /// The exit status could not be collected.
    WaitFailure,
}

crate::simple_display! {
    JobErrorKind {
        SpawnFailure => "spawn failure",
        ExitFailure => "exit failure",
        Killed => "killed",
        WaitFailure => "wait failure",
    }
}

/// Failure cause recorded on a terminal job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobError {
    pub kind: JobErrorKind,
    pub message: String,
}

impl JobError {
    pub fn new(kind: JobErrorKind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into() }
    }
}

impl std::fmt::Display for JobError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

/// Point-in-time view of a job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobStatus {
    pub id: JobId,
    pub queue: String,
    pub state: JobState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<JobError>,
    pub submitted_at_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at_ms: Option<u64>,
    /// Captured stdout, when the description asked for [`OutputTarget::Capture`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stdout: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stderr: Option<String>,
}

impl JobStatus {
    pub fn is_done(&self) -> bool {
        self.state.is_terminal()
    }

    pub fn is_running(&self) -> bool {
        self.state == JobState::Running
    }

    /// Run time of the process, if it was started and has finished.
    pub fn run_ms(&self) -> Option<u64> {
        Some(self.finished_at_ms?.saturating_sub(self.started_at_ms?))
    }
}

#[cfg(test)]
#[path = "job_tests.rs"]
mod tests;
