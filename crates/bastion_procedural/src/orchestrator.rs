//! # Chunk Orchestrator
//!
//! Runs generation jobs on a fixed pool of worker threads and hands the
//! results back to the owning thread in bounded batches.
//!
//! ## Lifecycle
//!
//! ```text
//! Queued -> Generating -> ReadyForHandoff -> Complete
//!                      \-> Failed
//! (any active state) ---cancel---> Cancelled
//! ```
//!
//! ## Threading
//!
//! - Exactly `max_concurrent` workers pull from one priority queue
//!   (higher priority first, FIFO within a priority).
//! - Workers share the read-only catalog and build a private solver per job.
//! - Results travel over a single MPSC channel; only the owner drains it,
//!   and at most `max` results per [`ChunkOrchestrator::drain`] call.
//! - [`ChunkOrchestrator::cancel`] bumps an epoch. Queued jobs are dropped,
//!   running jobs stop at their next iteration, and nothing started before
//!   the bump can reach the channel afterwards.

use std::cmp::Ordering as CmpOrdering;
use std::collections::{BinaryHeap, HashMap};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use parking_lot::{Condvar, Mutex};

use crate::assignment::Assignment;
use crate::catalog::Catalog;
use crate::config::{GeneratorConfig, OrchestratorConfig};
use crate::error::{GenerationError, GenerationResult};
use crate::grid::GridSize;
use crate::seed::GenerationSeed;
use crate::solver::ChunkSolver;

/// Identifies one generation job.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JobId(pub u64);

impl JobId {
    const BATCH_FLAG: u64 = 1 << 63;

    /// Packs a 2D chunk coordinate into a job id.
    ///
    /// Bit 63 is reserved for batch ids, so `x` keeps 31 bits: distinct ids
    /// are guaranteed for `x` in `-2^30..2^30` and any `z`.
    #[inline]
    #[must_use]
    #[allow(clippy::cast_sign_loss)]
    pub const fn from_chunk(x: i32, z: i32) -> Self {
        Self((((x as u32 as u64) << 32) | z as u32 as u64) & !Self::BATCH_FLAG)
    }

    /// Id of unit `unit` in distribution batch `batch`.
    #[inline]
    #[must_use]
    pub const fn for_batch(batch: u32, unit: u32) -> Self {
        Self(Self::BATCH_FLAG | ((batch as u64 & 0x7FFF_FFFF) << 32) | unit as u64)
    }

    /// Batch number, for ids made by [`JobId::for_batch`].
    #[inline]
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn batch(self) -> Option<u32> {
        if self.0 & Self::BATCH_FLAG == 0 {
            None
        } else {
            Some(((self.0 >> 32) & 0x7FFF_FFFF) as u32)
        }
    }

    /// Unit index, for ids made by [`JobId::for_batch`].
    #[inline]
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn unit(self) -> Option<u32> {
        if self.0 & Self::BATCH_FLAG == 0 {
            None
        } else {
            Some(self.0 as u32)
        }
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "job:{:016x}", self.0)
    }
}

/// Where a job is in its lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum JobState {
    /// Waiting for a worker.
    Queued,
    /// A worker is running it.
    Generating,
    /// Finished successfully, waiting in the completion channel.
    ReadyForHandoff,
    /// Handed to the materializer.
    Complete,
    /// Ended in a contradiction, timeout or invalid size.
    Failed,
    /// Dropped or aborted by [`ChunkOrchestrator::cancel`].
    Cancelled,
}

impl JobState {
    /// True for states in which a new request for the same id is ignored.
    #[inline]
    #[must_use]
    pub const fn blocks_request(self) -> bool {
        matches!(
            self,
            Self::Queued | Self::Generating | Self::ReadyForHandoff | Self::Complete
        )
    }
}

/// A fully specified generation request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct JobSpec {
    /// Job identity.
    pub id: JobId,
    /// Higher runs first.
    pub priority: i32,
    /// Grid dimensions.
    pub size: GridSize,
    /// Seed for this job's random stream.
    pub seed: GenerationSeed,
}

/// A finished job, as delivered by [`ChunkOrchestrator::drain`].
#[derive(Debug)]
pub struct Completion {
    /// The job.
    pub job: JobId,
    /// The assignment, or why there is none.
    pub outcome: GenerationResult<Assignment>,
    /// Wall time the worker spent on it.
    pub elapsed: Duration,
}

impl Completion {
    /// True if generation produced an assignment.
    #[inline]
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }
}

/// Job counts by state.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct OrchestratorStats {
    /// Waiting for a worker.
    pub queued: usize,
    /// Running on a worker.
    pub generating: usize,
    /// Waiting to be drained.
    pub ready: usize,
    /// Drained successfully.
    pub completed: usize,
    /// Failed.
    pub failed: usize,
    /// Cancelled.
    pub cancelled: usize,
}

#[derive(Debug)]
struct QueuedJob {
    spec: JobSpec,
    sequence: u64,
    epoch: u64,
}

impl PartialEq for QueuedJob {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == CmpOrdering::Equal
    }
}

impl Eq for QueuedJob {}

impl PartialOrd for QueuedJob {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueuedJob {
    // Max-heap: higher priority first, then lower sequence (FIFO).
    fn cmp(&self, other: &Self) -> CmpOrdering {
        self.spec
            .priority
            .cmp(&other.spec.priority)
            .then_with(|| other.sequence.cmp(&self.sequence))
    }
}

#[derive(Debug, Default)]
struct Scheduler {
    queue: BinaryHeap<QueuedJob>,
    states: HashMap<JobId, JobState>,
    sequence: u64,
    shutdown: bool,
}

struct Shared {
    scheduler: Mutex<Scheduler>,
    work_ready: Condvar,
    /// Bumped by cancel and shutdown. Written only under the scheduler lock.
    epoch: AtomicU64,
    catalog: Arc<Catalog>,
    generator: GeneratorConfig,
    completions: Sender<Completion>,
}

impl Shared {
    fn current_epoch(&self) -> u64 {
        self.epoch.load(Ordering::Acquire)
    }

    /// Blocks until a job is available. `None` on shutdown.
    fn next_job(&self) -> Option<(JobSpec, u64)> {
        let mut scheduler = self.scheduler.lock();
        loop {
            if scheduler.shutdown {
                return None;
            }
            if let Some(job) = scheduler.queue.pop() {
                if job.epoch != self.current_epoch() {
                    continue;
                }
                scheduler.states.insert(job.spec.id, JobState::Generating);
                return Some((job.spec, job.epoch));
            }
            self.work_ready.wait(&mut scheduler);
        }
    }

    fn run(&self, spec: &JobSpec, epoch: u64) -> GenerationResult<Assignment> {
        let mut solver = ChunkSolver::new(Arc::clone(&self.catalog), spec.size, spec.seed, &self.generator)?;
        solver.run_until(|| self.current_epoch() != epoch)
    }

    fn finish(&self, spec: &JobSpec, epoch: u64, outcome: GenerationResult<Assignment>, elapsed: Duration) {
        let mut scheduler = self.scheduler.lock();
        let id = spec.id;
        if epoch != self.current_epoch() || matches!(outcome, Err(GenerationError::Cancelled)) {
            scheduler.states.insert(id, JobState::Cancelled);
            tracing::debug!(job = %id, "generation cancelled in flight");
            return;
        }

        match &outcome {
            Ok(_) => {
                scheduler.states.insert(id, JobState::ReadyForHandoff);
                tracing::debug!(job = %id, elapsed_ms = elapsed.as_millis(), "generation finished");
            }
            Err(error) => {
                scheduler.states.insert(id, JobState::Failed);
                tracing::warn!(job = %id, size = %spec.size, %error, "generation failed");
            }
        }

        // Sent under the lock so cancel() can never miss it.
        let _ = self.completions.send(Completion {
            job: id,
            outcome,
            elapsed,
        });
    }
}

/// Concurrent generation service.
///
/// Construct once and pass by reference. Dropping it stops every worker and
/// waits for them to exit.
pub struct ChunkOrchestrator {
    shared: Arc<Shared>,
    completions: Receiver<Completion>,
    workers: Vec<JoinHandle<()>>,
    config: OrchestratorConfig,
}

impl ChunkOrchestrator {
    /// Starts the worker pool.
    ///
    /// # Errors
    ///
    /// Returns an error if a worker thread cannot be spawned.
    pub fn new(
        catalog: Arc<Catalog>,
        generator: GeneratorConfig,
        config: OrchestratorConfig,
    ) -> std::io::Result<Self> {
        let (sender, receiver) = unbounded();
        let shared = Arc::new(Shared {
            scheduler: Mutex::new(Scheduler::default()),
            work_ready: Condvar::new(),
            epoch: AtomicU64::new(0),
            catalog,
            generator,
            completions: sender,
        });

        let worker_count = config.max_concurrent.max(1);
        let mut orchestrator = Self {
            shared,
            completions: receiver,
            workers: Vec::with_capacity(worker_count),
            config,
        };

        for index in 0..worker_count {
            let shared = Arc::clone(&orchestrator.shared);
            let handle = thread::Builder::new()
                .name(format!("bastion-gen-{index}"))
                .spawn(move || Self::worker_loop(&shared))?;
            orchestrator.workers.push(handle);
        }

        tracing::debug!(workers = worker_count, "orchestrator started");
        Ok(orchestrator)
    }

    fn worker_loop(shared: &Shared) {
        while let Some((spec, epoch)) = shared.next_job() {
            let started = Instant::now();
            let outcome = shared.run(&spec, epoch);
            shared.finish(&spec, epoch, outcome, started.elapsed());
        }
    }

    /// Orchestrator configuration.
    #[must_use]
    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Generator configuration used by every job.
    #[must_use]
    pub fn generator_config(&self) -> &GeneratorConfig {
        &self.shared.generator
    }

    /// The shared catalog.
    #[must_use]
    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.shared.catalog
    }

    /// Queues a job with the default grid size and a seed derived from `id`.
    ///
    /// Returns false if the job is already queued, running, awaiting handoff
    /// or complete.
    pub fn request_generation(&self, id: JobId, priority: i32) -> bool {
        self.request(JobSpec {
            id,
            priority,
            size: self.shared.generator.grid_size,
            seed: self.config.seed.derive(id.0),
        })
    }

    /// Queues a fully specified job.
    ///
    /// Returns false if the job is already queued, running, awaiting handoff
    /// or complete. Failed and cancelled jobs may be requested again.
    pub fn request(&self, spec: JobSpec) -> bool {
        let mut scheduler = self.shared.scheduler.lock();
        if scheduler.shutdown {
            return false;
        }
        if scheduler
            .states
            .get(&spec.id)
            .is_some_and(|state| state.blocks_request())
        {
            return false;
        }

        scheduler.sequence += 1;
        let job = QueuedJob {
            spec,
            sequence: scheduler.sequence,
            epoch: self.shared.current_epoch(),
        };
        scheduler.queue.push(job);
        scheduler.states.insert(spec.id, JobState::Queued);
        drop(scheduler);

        self.shared.work_ready.notify_one();
        tracing::debug!(job = %spec.id, priority = spec.priority, size = %spec.size, "generation queued");
        true
    }

    /// Hands at most `max` finished jobs to `handler`. Returns how many.
    ///
    /// Successful jobs become [`JobState::Complete`] once the handler returns.
    pub fn drain(&self, max: usize, handler: impl FnMut(Completion)) -> usize {
        self.drain_inner(max, None, handler)
    }

    /// Like [`ChunkOrchestrator::drain`], but waits up to `timeout` for the
    /// first result.
    pub fn drain_timeout(&self, max: usize, timeout: Duration, handler: impl FnMut(Completion)) -> usize {
        self.drain_inner(max, Some(timeout), handler)
    }

    fn drain_inner(&self, max: usize, timeout: Option<Duration>, mut handler: impl FnMut(Completion)) -> usize {
        let mut handled = 0;
        while handled < max {
            let completion = match (handled, timeout) {
                (0, Some(timeout)) => match self.completions.recv_timeout(timeout) {
                    Ok(completion) => completion,
                    Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => break,
                },
                _ => match self.completions.try_recv() {
                    Ok(completion) => completion,
                    Err(_) => break,
                },
            };

            let id = completion.job;
            let success = completion.is_success();
            handler(completion);
            handled += 1;

            if success {
                let mut scheduler = self.shared.scheduler.lock();
                if let Some(state) = scheduler.states.get_mut(&id) {
                    if *state == JobState::ReadyForHandoff {
                        *state = JobState::Complete;
                    }
                }
            }
        }
        handled
    }

    /// Aborts every queued and running job.
    ///
    /// Results already waiting in the channel are discarded as well, so no
    /// result produced before this call is ever drained.
    pub fn cancel(&self) {
        let mut scheduler = self.shared.scheduler.lock();
        self.shared.epoch.fetch_add(1, Ordering::AcqRel);

        let dropped = scheduler.queue.len();
        let queued: Vec<JobId> = scheduler.queue.drain().map(|job| job.spec.id).collect();
        for id in queued {
            scheduler.states.insert(id, JobState::Cancelled);
        }
        let mut discarded = 0usize;
        for completion in self.completions.try_iter() {
            scheduler.states.insert(completion.job, JobState::Cancelled);
            discarded += 1;
        }
        tracing::info!(dropped, discarded, "generation cancelled");
    }

    /// Forgets a job that is no longer active, so its id may be reused.
    ///
    /// Returns the state it had, or `None` if it is unknown or still queued
    /// or running.
    pub fn release(&self, id: JobId) -> Option<JobState> {
        let mut scheduler = self.shared.scheduler.lock();
        match scheduler.states.get(&id) {
            Some(JobState::Queued | JobState::Generating) | None => None,
            Some(_) => scheduler.states.remove(&id),
        }
    }

    /// Current state of a job.
    #[must_use]
    pub fn state(&self, id: JobId) -> Option<JobState> {
        self.shared.scheduler.lock().states.get(&id).copied()
    }

    /// Job counts by state.
    #[must_use]
    pub fn stats(&self) -> OrchestratorStats {
        let scheduler = self.shared.scheduler.lock();
        let mut stats = OrchestratorStats::default();
        for state in scheduler.states.values() {
            match state {
                JobState::Queued => stats.queued += 1,
                JobState::Generating => stats.generating += 1,
                JobState::ReadyForHandoff => stats.ready += 1,
                JobState::Complete => stats.completed += 1,
                JobState::Failed => stats.failed += 1,
                JobState::Cancelled => stats.cancelled += 1,
            }
        }
        stats
    }

    /// Jobs queued, running, or waiting in the channel.
    #[must_use]
    pub fn pending(&self) -> usize {
        let scheduler = self.shared.scheduler.lock();
        let running = scheduler
            .states
            .values()
            .filter(|state| **state == JobState::Generating)
            .count();
        scheduler.queue.len() + running + self.completions.len()
    }

    /// True if nothing is queued, running or waiting to be drained.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.pending() == 0
    }
}

impl Drop for ChunkOrchestrator {
    fn drop(&mut self) {
        {
            let mut scheduler = self.shared.scheduler.lock();
            scheduler.shutdown = true;
            self.shared.epoch.fetch_add(1, Ordering::AcqRel);
            self.shared.work_ready.notify_all();
        }
        for handle in self.workers.drain(..) {
            let _ = handle.join();
        }
        tracing::debug!("orchestrator stopped");
    }
}

impl fmt::Debug for ChunkOrchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChunkOrchestrator")
            .field("workers", &self.workers.len())
            .field("config", &self.config)
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}
