// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Queue policies and queue status snapshots.

use serde::{Deserialize, Serialize};

/// One slot, jobs run strictly one after another.
pub const SINGLE_QUEUE: &str = "single";
/// Bounded to `multi_slots` concurrent jobs.
pub const MULTI_QUEUE: &str = "multi";
/// No concurrency limit.
pub const UNLIMITED_QUEUE: &str = "unlimited";

/// Names of the queues every engine provides, in display order.
pub const BUILTIN_QUEUES: [&str; 3] = [SINGLE_QUEUE, MULTI_QUEUE, UNLIMITED_QUEUE];

/// Largest slot count a bounded queue may have. Wider queues should be
/// unbounded.
pub const MAX_QUEUE_SLOTS: usize = 1 << 16;

/// Concurrency policy of a queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum QueuePolicy {
    Single,
    Bounded { slots: usize },
    Unbounded,
}

impl QueuePolicy {
    /// Maximum concurrently running jobs, `None` when unbounded.
    pub fn max_slots(self) -> Option<usize> {
        match self {
            QueuePolicy::Single => Some(1),
            QueuePolicy::Bounded { slots } => Some(slots),
            QueuePolicy::Unbounded => None,
        }
    }
}

impl std::fmt::Display for QueuePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QueuePolicy::Single => f.write_str("single"),
            QueuePolicy::Bounded { slots } => write!(f, "bounded({slots})"),
            QueuePolicy::Unbounded => f.write_str("unbounded"),
        }
    }
}

/// Point-in-time view of a queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStatus {
    pub name: String,
    pub policy: QueuePolicy,
    /// `None` for unbounded queues.
    pub max_slots: Option<usize>,
    /// Occupied slots.
    pub running: usize,
    /// Backlog length.
    pub pending: usize,
}

impl QueueStatus {
    /// Free slots, `None` when unbounded.
    pub fn free_slots(&self) -> Option<usize> {
        self.max_slots.map(|max| max.saturating_sub(self.running))
    }

    pub fn is_idle(&self) -> bool {
        self.running == 0 && self.pending == 0
    }
}

#[cfg(test)]
#[path = "queue_tests.rs"]
mod tests;
