// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! runq-engine: local job execution engine
//!
//! Named queues with concurrency limits, a bounded job history, and a
//! poller that detects process completion.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod dispatch;
mod error;
mod manager;
mod poller;
mod process;
mod queue;
mod registry;
mod resolve;

pub use error::{EngineError, SpawnError};
pub use manager::{JobManager, JobManagerBuilder};
pub use process::{
    CapturedOutput, JobStreams, LocalSpawner, ProcessExit, ProcessWrapper, Spawner,
};
pub use resolve::{CommandResolver, DirectResolver, ResolvedCommand};
