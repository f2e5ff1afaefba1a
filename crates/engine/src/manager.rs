// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job queue manager: the engine facade.
//!
//! Owns the named queues, the job registry, one dispatcher task per queue
//! and the poller. Callers only ever hold [`JobId`]s.

use crate::dispatch;
use crate::error::EngineError;
use crate::poller;
use crate::process::{JobStreams, LocalSpawner, Spawner};
use crate::queue::JobQueue;
use crate::registry::{Completion, JobRecord, Registry};
use crate::resolve::{CommandResolver, DirectResolver};
use indexmap::IndexMap;
use parking_lot::{Mutex, RwLock};
use runq_core::{
    Clock, EngineConfig, IdGen, JobDescription, JobError, JobErrorKind, JobId, JobState,
    JobStatus, QueueStatus, SequentialIdGen, SystemClock,
};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Upper bound on the sleep between idle checks during shutdown.
const SHUTDOWN_CHECK_INTERVAL: Duration = Duration::from_millis(25);

/// State shared by the manager, the dispatchers and the poller.
pub(crate) struct Shared<C: Clock> {
    pub(crate) config: EngineConfig,
    pub(crate) registry: Registry,
    pub(crate) queues: IndexMap<String, Arc<JobQueue>>,
    pub(crate) spawner: Arc<dyn Spawner>,
    pub(crate) resolver: Arc<dyn CommandResolver>,
    pub(crate) clock: C,
    ids: SequentialIdGen,
    /// `true` while submissions are accepted.
    admission: RwLock<bool>,
    pub(crate) dispatch_stop: CancellationToken,
    pub(crate) poller_stop: CancellationToken,
}

impl<C: Clock> Shared<C> {
    pub(crate) fn queue(&self, name: &str) -> Result<&Arc<JobQueue>, EngineError> {
        self.queues.get(name).ok_or_else(|| EngineError::UnknownQueue(name.to_string()))
    }

    /// Move a job to a terminal state and log the outcome.
    pub(crate) fn finish(
        &self,
        id: &JobId,
        state: JobState,
        exit_code: Option<i32>,
        error: Option<JobError>,
    ) -> Option<JobStatus> {
        let completion =
            Completion { state, exit_code, error, finished_at_ms: self.clock.epoch_ms() };
        let status = self.registry.finish(id, completion)?;
        match status.state {
            JobState::Done => {
                tracing::info!(job = %id, queue = %status.queue, elapsed_ms = ?status.run_ms(), "job done")
            }
            _ => tracing::info!(
                job = %id,
                queue = %status.queue,
                state = %status.state,
                exit_code = ?status.exit_code,
                error = ?status.error.as_ref().map(ToString::to_string),
                "job finished"
            ),
        }
        Some(status)
    }

    fn is_idle(&self) -> bool {
        self.queues.values().all(|queue| queue.is_idle())
    }

    fn running_count(&self) -> usize {
        self.queues.values().map(|queue| queue.status().running).sum()
    }
}

struct Tasks {
    dispatchers: Vec<JoinHandle<()>>,
    poller: JoinHandle<()>,
}

/// Builds a [`JobManager`] with custom collaborators.
///
/// ```ignore
/// let manager = JobManager::builder(EngineConfig::from_env())
///     .resolver(Arc::new(DirectResolver::with_home("/home/ci")))
///     .start()?;
/// ```
pub struct JobManagerBuilder<C: Clock = SystemClock> {
    config: EngineConfig,
    spawner: Option<Arc<dyn Spawner>>,
    resolver: Option<Arc<dyn CommandResolver>>,
    clock: C,
}

impl<C: Clock> JobManagerBuilder<C> {
    pub fn spawner(mut self, spawner: Arc<dyn Spawner>) -> Self {
        self.spawner = Some(spawner);
        self
    }

    pub fn resolver(mut self, resolver: Arc<dyn CommandResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    pub fn clock<D: Clock>(self, clock: D) -> JobManagerBuilder<D> {
        JobManagerBuilder {
            config: self.config,
            spawner: self.spawner,
            resolver: self.resolver,
            clock,
        }
    }

    /// Validate the configuration and start the dispatchers and poller on
    /// the current tokio runtime.
    pub fn start(self) -> Result<JobManager<C>, EngineError> {
        self.config.validate()?;
        let runtime = Handle::try_current().map_err(|_| EngineError::NoRuntime)?;
        let config = self.config;

        let queues: IndexMap<String, Arc<JobQueue>> = config
            .queue_policies()
            .into_iter()
            .map(|(name, policy)| {
                let queue = Arc::new(JobQueue::new(name.clone(), policy));
                (name, queue)
            })
            .collect();
        let spawner = self.spawner.unwrap_or_else(|| {
            Arc::new(LocalSpawner::new(config.max_output_bytes, config.kill_grace))
        });
        let resolver = self.resolver.unwrap_or_else(|| Arc::new(DirectResolver::new()));

        let shared = Arc::new(Shared {
            registry: Registry::new(config.max_history),
            queues,
            spawner,
            resolver,
            clock: self.clock,
            ids: SequentialIdGen::new("job"),
            admission: RwLock::new(true),
            dispatch_stop: CancellationToken::new(),
            poller_stop: CancellationToken::new(),
            config,
        });

        let dispatchers = shared
            .queues
            .values()
            .map(|queue| runtime.spawn(dispatch::run(Arc::clone(&shared), Arc::clone(queue))))
            .collect();
        let poller = runtime.spawn(poller::run(Arc::clone(&shared)));

        tracing::info!(
            queues = ?shared.queues.keys().collect::<Vec<_>>(),
            max_history = shared.config.max_history,
            poll_ms = shared.config.poll_interval.as_millis() as u64,
            "job engine started"
        );
        Ok(JobManager {
            shared,
            tasks: Mutex::new(Some(Tasks { dispatchers, poller })),
            stopped: CancellationToken::new(),
        })
    }
}

/// Local job execution engine.
///
/// Must be created inside a tokio runtime. Dropping the manager stops its
/// background tasks without waiting; call [`shutdown`](Self::shutdown) for
/// an orderly stop that also terminates running processes.
pub struct JobManager<C: Clock = SystemClock> {
    shared: Arc<Shared<C>>,
    tasks: Mutex<Option<Tasks>>,
    /// Cancelled when the shutdown that took `tasks` has finished.
    stopped: CancellationToken,
}

impl JobManager<SystemClock> {
    /// Start an engine with the local spawner and direct resolver.
    pub fn new(config: EngineConfig) -> Result<Self, EngineError> {
        Self::builder(config).start()
    }

    pub fn builder(config: EngineConfig) -> JobManagerBuilder<SystemClock> {
        JobManagerBuilder { config, spawner: None, resolver: None, clock: SystemClock }
    }
}

impl<C: Clock> JobManager<C> {
    pub fn config(&self) -> &EngineConfig {
        &self.shared.config
    }

    /// Submit to the queue named by `description.queue`.
    pub fn submit(&self, description: JobDescription) -> Result<JobId, EngineError> {
        let queue = description.queue.clone();
        self.submit_to(&queue, description)
    }

    /// Submit to `queue`, overriding `description.queue`. Returns as soon as
    /// the job is in the backlog.
    pub fn submit_to(
        &self,
        queue: &str,
        mut description: JobDescription,
    ) -> Result<JobId, EngineError> {
        let shared = &self.shared;
        // Held until the job is enqueued so shutdown cannot miss it.
        let admission = shared.admission.read();
        if !*admission {
            return Err(EngineError::EngineShuttingDown);
        }
        let target = shared.queue(queue)?;
        description.queue = queue.to_string();
        let command = shared.resolver.resolve(&description)?;

        let id = JobId::from_string(shared.ids.next());
        tracing::debug!(job = %id, queue, command = %command.display(), "job submitted");
        shared.registry.register(JobRecord::new(
            id.clone(),
            queue,
            command,
            shared.clock.epoch_ms(),
        ));
        target.push(id.clone());
        Ok(id)
    }

    pub fn status(&self, id: &JobId) -> Result<JobStatus, EngineError> {
        self.shared.registry.status(id).ok_or_else(|| EngineError::UnknownJob(id.clone()))
    }

    /// Status of each id; unknown ids yield an error in their own slot.
    pub fn statuses(&self, ids: &[JobId]) -> Vec<Result<JobStatus, EngineError>> {
        ids.iter().map(|id| self.status(id)).collect()
    }

    /// Cancel a job.
    ///
    /// A pending job is removed from its backlog and marked killed right
    /// away. A running job is signalled to terminate and is marked killed
    /// by the poller once it exits. Cancelling a finished job does nothing.
    pub fn cancel(&self, id: &JobId) -> Result<(), EngineError> {
        let shared = &self.shared;
        let (queue, state) = shared
            .registry
            .update(id, |job| {
                if !job.state.is_terminal() {
                    job.cancel_requested = true;
                }
                (job.queue.clone(), job.state)
            })
            .ok_or_else(|| EngineError::UnknownJob(id.clone()))?;
        if state.is_terminal() {
            return Ok(());
        }

        let queue = shared.queue(&queue)?;
        if queue.remove_pending(id) {
            tracing::info!(job = %id, queue = queue.name(), "cancelled pending job");
            shared.finish(
                id,
                JobState::Killed,
                None,
                Some(JobError::new(JobErrorKind::Killed, "cancelled before start")),
            );
        } else if let Some(process) = queue.process_of(id) {
            tracing::info!(job = %id, pid = ?process.pid(), "terminating running job");
            process.terminate();
        }
        // Otherwise the dispatcher is between popping and starting the job
        // and will observe the cancel flag itself.
        Ok(())
    }

    /// Take the live pipes of a running job submitted with
    /// [`StdinSource::Stream`](runq_core::StdinSource::Stream) or
    /// [`OutputTarget::Stream`](runq_core::OutputTarget::Stream).
    ///
    /// The pipes are handed out once. A job that has not started yet has
    /// no pipes; retry once it is running.
    pub fn streams(&self, id: &JobId) -> Result<JobStreams, EngineError> {
        let shared = &self.shared;
        let queue = shared
            .registry
            .with_job(id, |job| job.queue.clone())
            .ok_or_else(|| EngineError::UnknownJob(id.clone()))?;
        let process = shared.queue(&queue)?.process_of(id).ok_or_else(|| {
            EngineError::StreamsUnavailable { id: id.clone(), reason: "job is not running" }
        })?;
        let streams = process.take_streams().ok_or_else(|| EngineError::StreamsUnavailable {
            id: id.clone(),
            reason: "no streamed pipes, or already taken",
        })?;
        tracing::debug!(job = %id, pid = ?process.pid(), "handed out job streams");
        Ok(streams)
    }

    pub fn queue_status(&self, name: &str) -> Result<QueueStatus, EngineError> {
        Ok(self.shared.queue(name)?.status())
    }

    /// Status of each named queue, or of every queue when `names` is empty.
    pub fn queue_statuses(&self, names: &[&str]) -> Vec<Result<QueueStatus, EngineError>> {
        if names.is_empty() {
            return self.shared.queues.values().map(|queue| Ok(queue.status())).collect();
        }
        names.iter().map(|name| self.queue_status(name)).collect()
    }

    /// Configured queue names, built-in queues first.
    pub fn queue_names(&self) -> Vec<String> {
        self.shared.queues.keys().cloned().collect()
    }

    /// Ids of every job still known in the given queues (all queues when
    /// empty), in submission order.
    pub fn jobs(&self, queues: &[&str]) -> Result<Vec<JobId>, EngineError> {
        for name in queues {
            self.shared.queue(name)?;
        }
        let filter = if queues.is_empty() { None } else { Some(queues) };
        Ok(self.shared.registry.ids(filter))
    }

    /// Poll `status` until the job is terminal or `timeout` elapses.
    ///
    /// Returns the last snapshot either way; check [`JobStatus::is_done`].
    pub async fn wait_until_done(
        &self,
        id: &JobId,
        timeout: Duration,
    ) -> Result<JobStatus, EngineError> {
        let poll = self.shared.config.poll_interval;
        // `None` when the timeout is too large to represent: wait forever.
        let deadline = Instant::now().checked_add(timeout);
        loop {
            let status = self.status(id)?;
            if status.is_done() {
                return Ok(status);
            }
            let remaining = match deadline {
                Some(deadline) => deadline.saturating_duration_since(Instant::now()),
                None => poll,
            };
            if remaining.is_zero() {
                return Ok(status);
            }
            tokio::time::sleep(poll.min(remaining)).await;
        }
    }

    pub fn is_shut_down(&self) -> bool {
        !*self.shared.admission.read()
    }

    /// Stop the engine.
    ///
    /// Rejects new submissions, kills every pending job, gives running jobs
    /// `shutdown_grace` to finish, then force-kills the rest and stops the
    /// poller. Safe to call more than once, also concurrently; later calls
    /// wait for the first one to finish.
    pub async fn shutdown(&self) {
        let shared = &self.shared;
        *shared.admission.write() = false;
        let tasks = self.tasks.lock().take();
        let Some(tasks) = tasks else {
            self.stopped.cancelled().await;
            return;
        };
        // Released even if this future is dropped part way.
        let _stopped = self.stopped.clone().drop_guard();
        tracing::info!(running = shared.running_count(), "job engine shutting down");

        shared.dispatch_stop.cancel();
        for dispatcher in tasks.dispatchers {
            if let Err(e) = dispatcher.await {
                tracing::error!(error = %e, "dispatcher task failed");
            }
        }

        let mut dropped = 0;
        for queue in shared.queues.values() {
            for id in queue.drain_pending() {
                shared.finish(
                    &id,
                    JobState::Killed,
                    None,
                    Some(JobError::new(JobErrorKind::Killed, "engine shut down before start")),
                );
                dropped += 1;
            }
        }
        if dropped > 0 {
            tracing::info!(dropped, "killed pending jobs");
        }

        if !self.wait_idle(shared.config.shutdown_grace).await {
            let mut killed = 0;
            for queue in shared.queues.values() {
                for (id, process) in queue.running_snapshot() {
                    shared.registry.update(&id, |job| job.cancel_requested = true);
                    process.force_kill();
                    killed += 1;
                }
            }
            tracing::warn!(killed, "shutdown grace expired, killed running jobs");
            let wait = shared.config.kill_grace + shared.config.poll_interval;
            if !self.wait_idle(wait).await {
                tracing::warn!(running = shared.running_count(), "processes still running at shutdown");
            }
        }

        shared.poller_stop.cancel();
        if let Err(e) = tasks.poller.await {
            tracing::error!(error = %e, "poller task failed");
        }
        poller::sweep(shared, Duration::ZERO);
        tracing::info!(
            retained = shared.registry.len(),
            terminal = shared.registry.terminal_count(),
            "job engine stopped"
        );
    }

    async fn wait_idle(&self, grace: Duration) -> bool {
        let deadline = Instant::now().checked_add(grace);
        let step = self.shared.config.poll_interval.min(SHUTDOWN_CHECK_INTERVAL);
        loop {
            if self.shared.is_idle() {
                return true;
            }
            if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
                return false;
            }
            tokio::time::sleep(step).await;
        }
    }
}

impl<C: Clock> Drop for JobManager<C> {
    fn drop(&mut self) {
        self.shared.dispatch_stop.cancel();
        self.shared.poller_stop.cancel();
    }
}

#[cfg(test)]
#[path = "manager_tests.rs"]
mod tests;
