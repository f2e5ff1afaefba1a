// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! runq-core: data model shared by the runq engine and its front ends

pub mod macros;

pub mod clock;
pub mod config;
pub mod id;
pub mod job;
pub mod queue;
pub mod time_fmt;

pub use clock::{Clock, FakeClock, SystemClock};
pub use config::{ConfigError, EngineConfig};
pub use id::{IdGen, SequentialIdGen};
pub use job::{
    DescriptionError, JobDescription, JobError, JobErrorKind, JobId, JobState, JobStatus,
    OutputTarget, StdinSource,
};
pub use queue::{
    QueuePolicy, QueueStatus, BUILTIN_QUEUES, MAX_QUEUE_SLOTS, MULTI_QUEUE, SINGLE_QUEUE,
    UNLIMITED_QUEUE,
};
pub use time_fmt::format_elapsed_ms;
