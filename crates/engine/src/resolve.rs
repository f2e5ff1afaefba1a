// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Translation from a [`JobDescription`] to a concrete command line.

use crate::error::EngineError;
use indexmap::IndexMap;
use runq_core::{JobDescription, OutputTarget, StdinSource};
use std::path::{Path, PathBuf};

/// Everything a [`Spawner`](crate::Spawner) needs to start a process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedCommand {
    pub program: String,
    pub args: Vec<String>,
    /// `None` inherits the engine's working directory.
    pub cwd: Option<PathBuf>,
    pub env: IndexMap<String, String>,
    pub stdin: StdinSource,
    pub stdout: OutputTarget,
    pub stderr: OutputTarget,
}

impl ResolvedCommand {
    /// Command line for logs and error messages.
    pub fn display(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Maps a generic job description onto a command for one execution back-end.
pub trait CommandResolver: Send + Sync + 'static {
    fn resolve(&self, description: &JobDescription) -> Result<ResolvedCommand, EngineError>;
}

/// Runs the executable directly, expanding a leading `~` in paths.
#[derive(Debug, Clone, Default)]
pub struct DirectResolver {
    home: Option<PathBuf>,
}

impl DirectResolver {
    pub fn new() -> Self {
        Self { home: dirs::home_dir() }
    }

    /// Use a fixed home directory for `~` expansion.
    pub fn with_home(home: impl Into<PathBuf>) -> Self {
        Self { home: Some(home.into()) }
    }

    fn expand(&self, path: &Path) -> Result<PathBuf, EngineError> {
        let Ok(rest) = path.strip_prefix("~") else {
            return Ok(path.to_path_buf());
        };
        match &self.home {
            Some(home) => Ok(home.join(rest)),
            None => Err(EngineError::InvalidSubmission(format!(
                "cannot expand '{}': home directory unknown",
                path.display()
            ))),
        }
    }

    fn expand_output(&self, target: &OutputTarget) -> Result<OutputTarget, EngineError> {
        Ok(match target {
            OutputTarget::File { path, append } => {
                OutputTarget::File { path: self.expand(path)?, append: *append }
            }
            other => other.clone(),
        })
    }
}

impl CommandResolver for DirectResolver {
    fn resolve(&self, description: &JobDescription) -> Result<ResolvedCommand, EngineError> {
        description.validate()?;
        let stdin = match &description.stdin {
            StdinSource::File(path) => StdinSource::File(self.expand(path)?),
            other => other.clone(),
        };
        Ok(ResolvedCommand {
            program: description.executable.clone(),
            args: description.arguments.clone(),
            cwd: description.working_dir.as_deref().map(|p| self.expand(p)).transpose()?,
            env: description.environment.clone(),
            stdin,
            stdout: self.expand_output(&description.stdout)?,
            stderr: self.expand_output(&description.stderr)?,
        })
    }
}

#[cfg(test)]
#[path = "resolve_tests.rs"]
mod tests;
