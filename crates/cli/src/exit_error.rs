// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error type that carries a process exit code.
//!
//! Commands return `ExitError` instead of calling `std::process::exit()`
//! directly, so `main()` can shut the engine down before exiting.

use runq_core::{JobState, JobStatus};
use std::fmt;

/// Exit code for a job that was killed, as a shell reports SIGINT.
pub const KILLED_EXIT_CODE: i32 = 130;

#[derive(Debug)]
pub struct ExitError {
    pub code: i32,
    /// Printed to stderr unless empty.
    pub message: String,
}

impl ExitError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self { code, message: message.into() }
    }

    /// Exit status mirroring a finished job, or `None` when it succeeded.
    ///
    /// Failed jobs pass their own exit code through; failures without one
    /// (spawn errors) exit 1 and killed jobs exit 130.
    pub fn for_job(status: &JobStatus) -> Option<Self> {
        let code = match status.state {
            JobState::Done => return None,
            JobState::Killed => KILLED_EXIT_CODE,
            JobState::Error => status.exit_code.filter(|&code| code != 0).unwrap_or(1),
            JobState::Pending | JobState::Running => 1,
        };
        Some(Self::new(code, ""))
    }
}

impl fmt::Display for ExitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ExitError {}

#[cfg(test)]
#[path = "exit_error_tests.rs"]
mod tests;
