// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-queue backlog and slot bookkeeping.
//!
//! A queue owns a FIFO backlog of pending job ids and the set of occupied
//! slots (job id to live process). Bounded queues hand out one semaphore
//! permit per slot; the permit travels with the occupied slot and is given
//! back when the slot is released, so the number of occupied slots can never
//! exceed the queue's maximum.

use crate::process::ProcessWrapper;
use indexmap::IndexMap;
use parking_lot::Mutex;
use runq_core::{JobId, QueuePolicy, QueueStatus};
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::{Notify, OwnedSemaphorePermit, Semaphore};

/// Right to occupy one slot. Unbounded queues hand out permits without a
/// semaphore behind them.
#[derive(Debug)]
pub(crate) struct SlotPermit {
    _held: Option<OwnedSemaphorePermit>,
}

struct Slot {
    process: ProcessWrapper,
    _permit: SlotPermit,
}

#[derive(Default)]
struct QueueInner {
    backlog: VecDeque<JobId>,
    running: IndexMap<JobId, Slot>,
}

pub(crate) struct JobQueue {
    name: String,
    policy: QueuePolicy,
    slots: Option<Arc<Semaphore>>,
    inner: Mutex<QueueInner>,
    available: Notify,
}

impl JobQueue {
    pub(crate) fn new(name: impl Into<String>, policy: QueuePolicy) -> Self {
        Self {
            name: name.into(),
            policy,
            slots: policy.max_slots().map(|n| Arc::new(Semaphore::new(n))),
            inner: Mutex::new(QueueInner::default()),
            available: Notify::new(),
        }
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    /// Append a job to the backlog and wake the dispatcher.
    pub(crate) fn push(&self, id: JobId) {
        self.inner.lock().backlog.push_back(id);
        self.available.notify_one();
    }

    pub(crate) fn pop_pending(&self) -> Option<JobId> {
        self.inner.lock().backlog.pop_front()
    }

    /// Remove a job from the backlog. False if it was not waiting.
    pub(crate) fn remove_pending(&self, id: &JobId) -> bool {
        let mut inner = self.inner.lock();
        match inner.backlog.iter().position(|queued| queued == id) {
            Some(index) => inner.backlog.remove(index).is_some(),
            None => false,
        }
    }

    pub(crate) fn drain_pending(&self) -> Vec<JobId> {
        self.inner.lock().backlog.drain(..).collect()
    }

    /// Wait for a job to appear in the backlog.
    pub(crate) async fn job_available(&self) {
        self.available.notified().await
    }

    /// Wait for a free slot. `None` if the slot semaphore was closed.
    pub(crate) async fn acquire_slot(&self) -> Option<SlotPermit> {
        match &self.slots {
            Some(semaphore) => {
                let permit = semaphore.clone().acquire_owned().await.ok()?;
                Some(SlotPermit { _held: Some(permit) })
            }
            None => Some(SlotPermit { _held: None }),
        }
    }

    /// Record `process` as running in a slot for `id`.
    pub(crate) fn occupy(&self, id: JobId, process: ProcessWrapper, permit: SlotPermit) {
        let mut inner = self.inner.lock();
        debug_assert!(
            !matches!(self.policy.max_slots(), Some(max) if inner.running.len() >= max),
            "queue {} over capacity",
            self.name
        );
        inner.running.insert(id, Slot { process, _permit: permit });
    }

    /// Free the slot held by `id`, returning its permit to the queue.
    pub(crate) fn release(&self, id: &JobId) -> bool {
        self.inner.lock().running.shift_remove(id).is_some()
    }

    pub(crate) fn process_of(&self, id: &JobId) -> Option<ProcessWrapper> {
        self.inner.lock().running.get(id).map(|slot| slot.process.clone())
    }

    /// Occupied slots, in the order they were filled.
    pub(crate) fn running_snapshot(&self) -> Vec<(JobId, ProcessWrapper)> {
        self.inner
            .lock()
            .running
            .iter()
            .map(|(id, slot)| (id.clone(), slot.process.clone()))
            .collect()
    }

    pub(crate) fn is_idle(&self) -> bool {
        let inner = self.inner.lock();
        inner.running.is_empty() && inner.backlog.is_empty()
    }

    pub(crate) fn status(&self) -> QueueStatus {
        let inner = self.inner.lock();
        QueueStatus {
            name: self.name.clone(),
            policy: self.policy,
            max_slots: self.policy.max_slots(),
            running: inner.running.len(),
            pending: inner.backlog.len(),
        }
    }
}

#[cfg(test)]
#[path = "queue_tests.rs"]
mod tests;
