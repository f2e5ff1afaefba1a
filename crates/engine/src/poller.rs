// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Completion poller.
//!
//! Every `poll_interval` the poller checks each occupied slot of each queue.
//! Exited processes are finalized in the registry and their slot released.
//! This is the only place running jobs become terminal, so a job's final
//! state lags its process exit by at most one interval, plus the time its
//! captured output takes to drain.

use crate::manager::Shared;
use crate::process::ProcessExit;
use runq_core::{Clock, JobError, JobErrorKind, JobId, JobState};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;

/// How long an exited job may wait for its captured output to reach EOF.
pub(crate) const OUTPUT_DRAIN_WAIT: Duration = Duration::from_millis(500);

pub(crate) async fn run<C: Clock>(shared: Arc<Shared<C>>) {
    let stop = shared.poller_stop.clone();
    let mut ticker = tokio::time::interval(shared.config.poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            biased;
            _ = stop.cancelled() => break,
            _ = ticker.tick() => {
                sweep(&shared, OUTPUT_DRAIN_WAIT);
            }
        }
    }
    tracing::debug!("poller stopped");
}

/// Finalize every exited process whose captured output is complete, or
/// has had `drain_wait` to complete. Returns the number of jobs finalized.
pub(crate) fn sweep<C: Clock>(shared: &Shared<C>, drain_wait: Duration) -> usize {
    let mut finalized = 0;
    for queue in shared.queues.values() {
        for (id, process) in queue.running_snapshot() {
            let outcome = match process.try_settle(drain_wait) {
                Ok(None) => continue,
                Ok(Some(exit)) => Ok(exit),
                Err(e) => Err(e),
            };
            finalize(shared, &id, outcome);
            let released = queue.release(&id);
            debug_assert!(released, "slot for {id} released twice");
            if !released {
                tracing::error!(job = %id, queue = queue.name(), "slot already released");
            }
            finalized += 1;
        }
    }
    finalized
}

fn finalize<C: Clock>(shared: &Shared<C>, id: &JobId, outcome: std::io::Result<ProcessExit>) {
    let cancelled = shared.registry.with_job(id, |job| job.cancel_requested);
    debug_assert!(cancelled.is_some(), "occupied slot for unknown job {id}");
    let Some(cancelled) = cancelled else {
        tracing::error!(job = %id, "occupied slot for unknown job");
        return;
    };
    let (state, exit_code, error) = match outcome {
        Ok(exit) if cancelled => (
            JobState::Killed,
            exit.code,
            Some(JobError::new(JobErrorKind::Killed, format!("cancelled ({})", exit.describe()))),
        ),
        Ok(exit) if exit.success() => (JobState::Done, exit.code, None),
        Ok(exit) => (
            JobState::Error,
            exit.code,
            Some(JobError::new(JobErrorKind::ExitFailure, exit.describe())),
        ),
        Err(e) => (
            JobState::Error,
            None,
            Some(JobError::new(JobErrorKind::WaitFailure, e.to_string())),
        ),
    };
    let finished = shared.finish(id, state, exit_code, error).is_some();
    debug_assert!(finished, "running job {id} could not be finalized");
    if !finished {
        tracing::error!(job = %id, "running job could not be finalized");
    }
}
