// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Engine configuration: defaults, `RUNQ_*` environment overrides, TOML files.

use crate::queue::{
    QueuePolicy, BUILTIN_QUEUES, MAX_QUEUE_SLOTS, MULTI_QUEUE, SINGLE_QUEUE, UNLIMITED_QUEUE,
};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

const DEFAULT_MAX_HISTORY: usize = 1000;
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(1000);
const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(5);
const DEFAULT_KILL_GRACE: Duration = Duration::from_secs(2);
const DEFAULT_MAX_OUTPUT_BYTES: usize = 1024 * 1024;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file {}: {source}", path.display())]
    Io { path: PathBuf, source: std::io::Error },
    #[error("invalid config file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Construction-time settings of a job engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Slot count of the built-in `multi` queue.
    pub multi_slots: usize,
    /// Terminal jobs retained for status queries before the oldest are evicted.
    pub max_history: usize,
    /// Period of the completion poller.
    #[serde(rename = "poll_ms", with = "duration_ms")]
    pub poll_interval: Duration,
    /// How long shutdown lets running jobs finish before killing them.
    #[serde(rename = "shutdown_grace_ms", with = "duration_ms")]
    pub shutdown_grace: Duration,
    /// Delay between SIGTERM and SIGKILL when a job is terminated.
    #[serde(rename = "kill_grace_ms", with = "duration_ms")]
    pub kill_grace: Duration,
    /// Per-stream cap on captured output; the tail is kept.
    pub max_output_bytes: usize,
    /// Additional named queues.
    pub queues: IndexMap<String, QueuePolicy>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            multi_slots: std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1),
            max_history: DEFAULT_MAX_HISTORY,
            poll_interval: DEFAULT_POLL_INTERVAL,
            shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
            kill_grace: DEFAULT_KILL_GRACE,
            max_output_bytes: DEFAULT_MAX_OUTPUT_BYTES,
            queues: IndexMap::new(),
        }
    }
}

impl EngineConfig {
    crate::setters! {
        set {
            multi_slots: usize,
            max_history: usize,
            poll_interval: Duration,
            shutdown_grace: Duration,
            kill_grace: Duration,
            max_output_bytes: usize,
        }
    }

    /// Add a named queue.
    pub fn queue(mut self, name: impl Into<String>, policy: QueuePolicy) -> Self {
        self.queues.insert(name.into(), policy);
        self
    }

    /// Defaults with `RUNQ_*` environment overrides applied.
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    /// Parse a TOML document. Unset keys keep their defaults.
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(source)?)
    }

    /// Read a TOML file, then apply environment overrides on top.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let source = std::fs::read_to_string(path)
            .map_err(|source| ConfigError::Io { path: path.to_path_buf(), source })?;
        Ok(Self::from_toml_str(&source)?.with_env_overrides())
    }

    /// Apply `RUNQ_*` environment variables. Unparseable values are ignored.
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(n) = env::multi_slots() {
            self.multi_slots = n;
        }
        if let Some(n) = env::max_history() {
            self.max_history = n;
        }
        if let Some(d) = env::poll_interval() {
            self.poll_interval = d;
        }
        if let Some(d) = env::shutdown_grace() {
            self.shutdown_grace = d;
        }
        if let Some(d) = env::kill_grace() {
            self.kill_grace = d;
        }
        if let Some(n) = env::max_output_bytes() {
            self.max_output_bytes = n;
        }
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.poll_interval.is_zero() {
            return Err(ConfigError::Invalid("poll interval must be greater than zero".into()));
        }
        if self.multi_slots == 0 {
            return Err(ConfigError::Invalid("multi_slots must be at least 1".into()));
        }
        if self.multi_slots > MAX_QUEUE_SLOTS {
            return Err(ConfigError::Invalid(format!(
                "multi_slots must be at most {MAX_QUEUE_SLOTS}"
            )));
        }
        for (name, policy) in &self.queues {
            if name.trim().is_empty() {
                return Err(ConfigError::Invalid("queue name is empty".into()));
            }
            if BUILTIN_QUEUES.contains(&name.as_str()) {
                return Err(ConfigError::Invalid(format!("queue '{name}' is built in")));
            }
            match *policy {
                QueuePolicy::Bounded { slots: 0 } => {
                    return Err(ConfigError::Invalid(format!("queue '{name}' has zero slots")));
                }
                QueuePolicy::Bounded { slots } if slots > MAX_QUEUE_SLOTS => {
                    return Err(ConfigError::Invalid(format!(
                        "queue '{name}' has more than {MAX_QUEUE_SLOTS} slots"
                    )));
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Every queue the engine serves: built-ins first, then named queues in
    /// definition order.
    pub fn queue_policies(&self) -> Vec<(String, QueuePolicy)> {
        let mut all = vec![
            (SINGLE_QUEUE.to_string(), QueuePolicy::Single),
            (MULTI_QUEUE.to_string(), QueuePolicy::Bounded { slots: self.multi_slots }),
            (UNLIMITED_QUEUE.to_string(), QueuePolicy::Unbounded),
        ];
        all.extend(self.queues.iter().map(|(name, policy)| (name.clone(), *policy)));
        all
    }
}

/// Centralized environment variable access.
mod env {
    use std::time::Duration;

    fn parse<T: std::str::FromStr>(name: &str) -> Option<T> {
        std::env::var(name).ok().and_then(|s| s.trim().parse::<T>().ok())
    }

    fn millis(name: &str) -> Option<Duration> {
        parse::<u64>(name).map(Duration::from_millis)
    }

    /// Slot count of the `multi` queue (`RUNQ_MULTI_SLOTS`).
    pub(super) fn multi_slots() -> Option<usize> {
        parse("RUNQ_MULTI_SLOTS")
    }

    /// History capacity (`RUNQ_MAX_HISTORY`).
    pub(super) fn max_history() -> Option<usize> {
        parse("RUNQ_MAX_HISTORY")
    }

    /// Poll interval override (`RUNQ_POLL_MS`).
    pub(super) fn poll_interval() -> Option<Duration> {
        millis("RUNQ_POLL_MS")
    }

    /// Shutdown grace period (`RUNQ_SHUTDOWN_GRACE_MS`).
    pub(super) fn shutdown_grace() -> Option<Duration> {
        millis("RUNQ_SHUTDOWN_GRACE_MS")
    }

    /// SIGTERM to SIGKILL delay (`RUNQ_KILL_GRACE_MS`).
    pub(super) fn kill_grace() -> Option<Duration> {
        millis("RUNQ_KILL_GRACE_MS")
    }

    /// Captured output cap (`RUNQ_MAX_OUTPUT_BYTES`).
    pub(super) fn max_output_bytes() -> Option<usize> {
        parse("RUNQ_MAX_OUTPUT_BYTES")
    }
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub(super) fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
