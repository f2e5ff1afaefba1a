// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Engine error types.
//!
//! Only malformed requests and references to nonexistent entities surface as
//! [`EngineError`]. Failures of an individual job (spawn errors, non-zero
//! exits) are recorded on the job and observed through `status`.

use runq_core::{ConfigError, DescriptionError, JobId};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("unknown queue: {0}")]
    UnknownQueue(String),
    #[error("unknown job: {0}")]
    UnknownJob(JobId),
    #[error("invalid submission: {0}")]
    InvalidSubmission(String),
    #[error("engine is shutting down")]
    EngineShuttingDown,
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("the job engine must be started inside a tokio runtime")]
    NoRuntime,
    #[error("streams of {id} are unavailable: {reason}")]
    StreamsUnavailable { id: JobId, reason: &'static str },
}

impl From<DescriptionError> for EngineError {
    fn from(e: DescriptionError) -> Self {
        EngineError::InvalidSubmission(e.to_string())
    }
}

/// A process could not be started.
#[derive(Debug, Error)]
pub enum SpawnError {
    #[error("failed to spawn `{command}`: {source}")]
    Spawn { command: String, source: std::io::Error },
    #[error("redirection failed: {message}: {source}")]
    Redirect { message: String, source: std::io::Error },
}
