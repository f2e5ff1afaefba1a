// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job registry: the authoritative map from job id to job state.
//!
//! Jobs are kept in submission order. Terminal jobs are additionally queued
//! in the order they finished; once more than `capacity` terminal jobs are
//! held, the oldest are evicted. Non-terminal jobs are never evicted.
//!
//! With a capacity of zero a job is evicted at the moment it becomes
//! terminal, so a caller polling `status` will see `UnknownJob` instead of
//! the final state.

use crate::process::CapturedOutput;
use crate::resolve::ResolvedCommand;
use indexmap::IndexMap;
use parking_lot::Mutex;
use runq_core::{JobError, JobId, JobState, JobStatus};
use std::collections::VecDeque;
use std::sync::Arc;

/// Engine-side state of one job.
#[derive(Debug, Clone)]
pub(crate) struct JobRecord {
    pub(crate) id: JobId,
    pub(crate) command: Arc<ResolvedCommand>,
    pub(crate) queue: String,
    pub(crate) state: JobState,
    pub(crate) submitted_at_ms: u64,
    pub(crate) started_at_ms: Option<u64>,
    pub(crate) finished_at_ms: Option<u64>,
    pub(crate) exit_code: Option<i32>,
    pub(crate) error: Option<JobError>,
    /// Set by `cancel`; decides KILLED versus DONE/ERROR when the process exits.
    pub(crate) cancel_requested: bool,
    pub(crate) stdout: Option<CapturedOutput>,
    pub(crate) stderr: Option<CapturedOutput>,
}

impl JobRecord {
    pub(crate) fn new(
        id: JobId,
        queue: impl Into<String>,
        command: ResolvedCommand,
        submitted_at_ms: u64,
    ) -> Self {
        Self {
            id,
            queue: queue.into(),
            command: Arc::new(command),
            state: JobState::Pending,
            submitted_at_ms,
            started_at_ms: None,
            finished_at_ms: None,
            exit_code: None,
            error: None,
            cancel_requested: false,
            stdout: None,
            stderr: None,
        }
    }

    pub(crate) fn snapshot(&self) -> JobStatus {
        JobStatus {
            id: self.id.clone(),
            queue: self.queue.clone(),
            state: self.state,
            exit_code: self.exit_code,
            error: self.error.clone(),
            submitted_at_ms: self.submitted_at_ms,
            started_at_ms: self.started_at_ms,
            finished_at_ms: self.finished_at_ms,
            stdout: self.stdout.as_ref().map(CapturedOutput::text),
            stderr: self.stderr.as_ref().map(CapturedOutput::text),
        }
    }
}

/// Outcome written by [`Registry::finish`].
#[derive(Debug, Clone)]
pub(crate) struct Completion {
    pub(crate) state: JobState,
    pub(crate) exit_code: Option<i32>,
    pub(crate) error: Option<JobError>,
    pub(crate) finished_at_ms: u64,
}

#[derive(Default)]
struct RegistryInner {
    jobs: IndexMap<JobId, JobRecord>,
    /// Terminal jobs, oldest first.
    terminal: VecDeque<JobId>,
}

pub(crate) struct Registry {
    capacity: usize,
    inner: Mutex<RegistryInner>,
}

impl Registry {
    pub(crate) fn new(capacity: usize) -> Self {
        Self { capacity, inner: Mutex::new(RegistryInner::default()) }
    }

    pub(crate) fn register(&self, record: JobRecord) {
        let mut inner = self.inner.lock();
        debug_assert!(!inner.jobs.contains_key(&record.id), "duplicate job id {}", record.id);
        inner.jobs.insert(record.id.clone(), record);
    }

    pub(crate) fn status(&self, id: &JobId) -> Option<JobStatus> {
        self.inner.lock().jobs.get(id).map(JobRecord::snapshot)
    }

    /// Read fields of one job under the registry lock.
    pub(crate) fn with_job<R>(&self, id: &JobId, f: impl FnOnce(&JobRecord) -> R) -> Option<R> {
        self.inner.lock().jobs.get(id).map(f)
    }

    /// Atomic read-modify-write of one job's non-lifecycle fields.
    ///
    /// Terminal transitions go through [`finish`](Self::finish) so that
    /// history ordering and eviction stay consistent.
    pub(crate) fn update<R>(&self, id: &JobId, f: impl FnOnce(&mut JobRecord) -> R) -> Option<R> {
        let mut inner = self.inner.lock();
        let job = inner.jobs.get_mut(id)?;
        let before = job.state;
        let result = f(job);
        debug_assert!(
            job.state == before || (before.can_transition_to(job.state) && !job.state.is_terminal()),
            "illegal transition {before} -> {} for {id} outside finish()",
            job.state
        );
        Some(result)
    }

    /// Move a job to a terminal state, then enforce the history capacity.
    ///
    /// Returns the final snapshot, or `None` if the job is unknown or the
    /// state machine forbids the transition (e.g. it is already terminal).
    pub(crate) fn finish(&self, id: &JobId, completion: Completion) -> Option<JobStatus> {
        debug_assert!(completion.state.is_terminal());
        let mut inner = self.inner.lock();
        let job = inner.jobs.get_mut(id)?;
        if !job.state.can_transition_to(completion.state) {
            return None;
        }
        job.state = completion.state;
        job.exit_code = completion.exit_code;
        job.error = completion.error;
        job.finished_at_ms = Some(completion.finished_at_ms);
        let snapshot = job.snapshot();
        inner.terminal.push_back(id.clone());
        Self::evict_over_capacity(&mut inner, self.capacity);
        Some(snapshot)
    }

    fn evict_over_capacity(inner: &mut RegistryInner, capacity: usize) -> usize {
        let mut evicted = 0;
        while inner.terminal.len() > capacity {
            let Some(oldest) = inner.terminal.pop_front() else {
                break;
            };
            inner.jobs.shift_remove(&oldest);
            evicted += 1;
        }
        if evicted > 0 {
            tracing::debug!(evicted, retained = inner.terminal.len(), "evicted job history");
        }
        evicted
    }

    /// Ids of known jobs in submission order, optionally limited to some queues.
    pub(crate) fn ids(&self, queues: Option<&[&str]>) -> Vec<JobId> {
        self.inner
            .lock()
            .jobs
            .values()
            .filter(|job| match queues {
                Some(names) => names.contains(&job.queue.as_str()),
                None => true,
            })
            .map(|job| job.id.clone())
            .collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.inner.lock().jobs.len()
    }

    pub(crate) fn terminal_count(&self) -> usize {
        self.inner.lock().terminal.len()
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
