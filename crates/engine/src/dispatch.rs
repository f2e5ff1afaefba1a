// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Queue dispatcher: moves jobs from a queue's backlog into its slots.
//!
//! One dispatcher runs per queue. It waits for a free slot, then for the
//! oldest pending job, and starts it. Starting is synchronous, so jobs of one
//! queue start strictly in submission order; an unbounded queue simply never
//! waits for a slot.

use crate::manager::Shared;
use crate::queue::{JobQueue, SlotPermit};
use runq_core::{Clock, JobError, JobErrorKind, JobId, JobState};
use std::sync::Arc;

pub(crate) async fn run<C: Clock>(shared: Arc<Shared<C>>, queue: Arc<JobQueue>) {
    let stop = shared.dispatch_stop.clone();
    loop {
        let permit = tokio::select! {
            biased;
            _ = stop.cancelled() => break,
            permit = queue.acquire_slot() => permit,
        };
        let Some(permit) = permit else {
            tracing::error!(queue = queue.name(), "slot semaphore closed");
            break;
        };
        let id = loop {
            if let Some(id) = queue.pop_pending() {
                break id;
            }
            tokio::select! {
                biased;
                _ = stop.cancelled() => return,
                _ = queue.job_available() => {}
            }
        };
        start_job(&shared, &queue, id, permit);
    }
    tracing::debug!(queue = queue.name(), "dispatcher stopped");
}

/// Spawn the process for `id` and hand it a slot.
///
/// The permit is dropped (freeing the slot) when the job never gets a
/// process: cancelled while waiting, or failed to spawn.
fn start_job<C: Clock>(shared: &Shared<C>, queue: &JobQueue, id: JobId, permit: SlotPermit) {
    let record = shared.registry.with_job(&id, |job| {
        (Arc::clone(&job.command), job.state == JobState::Pending && !job.cancel_requested)
    });
    debug_assert!(record.is_some(), "dispatched job {id} is not registered");
    let Some((command, startable)) = record else {
        tracing::error!(job = %id, queue = queue.name(), "dispatched job is not registered");
        return;
    };
    if !startable {
        shared.finish(
            &id,
            JobState::Killed,
            None,
            Some(JobError::new(JobErrorKind::Killed, "cancelled before start")),
        );
        return;
    }

    let process = match shared.spawner.spawn(&command) {
        Ok(process) => process,
        Err(e) => {
            tracing::warn!(job = %id, queue = queue.name(), error = %e, "job failed to start");
            shared.finish(
                &id,
                JobState::Error,
                None,
                Some(JobError::new(JobErrorKind::SpawnFailure, e.to_string())),
            );
            return;
        }
    };

    let started_at = shared.clock.epoch_ms();
    shared.registry.update(&id, |job| {
        job.state = JobState::Running;
        job.started_at_ms = Some(started_at);
        job.stdout = process.stdout();
        job.stderr = process.stderr();
    });
    tracing::info!(
        job = %id,
        queue = queue.name(),
        pid = ?process.pid(),
        command = process.command(),
        "job started"
    );
    queue.occupy(id.clone(), process.clone(), permit);

    // A cancel that arrived before the slot was visible could not reach the
    // process; deliver it now.
    if shared.registry.with_job(&id, |job| job.cancel_requested).unwrap_or(false) {
        process.terminate();
    }
}
