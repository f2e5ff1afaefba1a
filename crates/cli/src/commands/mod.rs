// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! CLI command implementations

pub mod batch;
pub mod queues;
pub mod run;

use anyhow::{Context, Result};
use runq_core::{EngineConfig, JobId, JobStatus};
use runq_engine::JobManager;
use std::path::Path;
use std::time::Duration;

/// Engine settings from `--config` (plus environment overrides), or from
/// the environment alone.
pub(crate) fn load_config(path: Option<&Path>) -> Result<EngineConfig> {
    match path {
        Some(path) => EngineConfig::load(path)
            .with_context(|| format!("failed to load config {}", path.display())),
        None => Ok(EngineConfig::from_env()),
    }
}

/// Start an engine whose history can hold every job this invocation
/// submits, so none is evicted before its final status is read.
pub(crate) fn start_engine(config: EngineConfig, jobs: usize) -> Result<JobManager> {
    let history = config.max_history.max(jobs);
    Ok(JobManager::new(config.max_history(history))?)
}

pub(crate) fn parse_key_value(s: &str) -> Result<(String, String), String> {
    let (key, value) =
        s.split_once('=').ok_or_else(|| format!("invalid input format '{s}': must be KEY=VALUE"))?;
    Ok((key.to_string(), value.to_string()))
}

/// Parse a human-readable duration such as `90`, `30s`, `5m` or `1h30m`.
/// A bare number is seconds.
pub(crate) fn parse_duration(s: &str) -> Result<Duration, String> {
    let invalid = || format!("invalid duration: {s}");
    let mut total_secs: u64 = 0;
    let mut digits = String::new();
    for c in s.trim().chars() {
        if c.is_ascii_digit() {
            digits.push(c);
            continue;
        }
        let n: u64 = digits.parse().map_err(|_| invalid())?;
        digits.clear();
        let secs = match c {
            'h' => n.checked_mul(3600),
            'm' => n.checked_mul(60),
            's' => Some(n),
            _ => return Err(format!("unknown duration unit '{c}' in: {s}")),
        };
        total_secs = secs.and_then(|secs| total_secs.checked_add(secs)).ok_or_else(invalid)?;
    }
    if !digits.is_empty() {
        let secs = digits.parse::<u64>().map_err(|_| invalid())?;
        total_secs = total_secs.checked_add(secs).ok_or_else(invalid)?;
    }
    if total_secs == 0 {
        return Err(format!("duration must be > 0: {s}"));
    }
    Ok(Duration::from_secs(total_secs))
}

/// Wait for every job to finish.
///
/// On `timeout` or Ctrl-C the unfinished jobs are cancelled and their final
/// (killed) state is awaited instead.
pub(crate) async fn wait_all(
    engine: &JobManager,
    ids: &[JobId],
    timeout: Option<Duration>,
) -> Result<Vec<JobStatus>> {
    let finish = async {
        let mut statuses = Vec::with_capacity(ids.len());
        for id in ids {
            statuses.push(engine.wait_until_done(id, Duration::MAX).await?);
        }
        anyhow::Ok(statuses)
    };
    let deadline = async {
        match timeout {
            Some(timeout) => tokio::time::sleep(timeout).await,
            None => std::future::pending().await,
        }
    };

    tokio::select! {
        statuses = finish => return statuses,
        _ = deadline => tracing::warn!(jobs = ids.len(), "timed out, cancelling jobs"),
        _ = tokio::signal::ctrl_c() => tracing::warn!(jobs = ids.len(), "interrupted, cancelling jobs"),
    }

    for id in ids {
        if let Err(e) = engine.cancel(id) {
            tracing::debug!(job = %id, error = %e, "cancel failed");
        }
    }
    let config = engine.config();
    let grace = config.kill_grace + config.poll_interval * 2 + Duration::from_secs(1);
    let mut statuses = Vec::with_capacity(ids.len());
    for id in ids {
        statuses.push(engine.wait_until_done(id, grace).await.context("job vanished while cancelling")?);
    }
    Ok(statuses)
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
