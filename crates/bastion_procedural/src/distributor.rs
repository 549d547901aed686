//! # Batch Distributor
//!
//! Spreads many independent structures across a disk and tracks each one
//! through generation and prop scattering.
//!
//! ## Flow
//!
//! 1. [`BatchDistributor::generate_all`] samples sites and submits one job
//!    per site to the orchestrator.
//! 2. The owner calls [`BatchDistributor::pump`] at its own cadence. Each
//!    drained result is scattered and handed to the structure callback.
//! 3. A unit counts as complete only once its result was handled, whether it
//!    succeeded or failed. The completion callback fires once per batch,
//!    after the last unit.
//!
//! The distributor assumes it is the only consumer draining its
//! orchestrator: completions that do not belong to the current batch are
//! released and ignored.

use std::time::{Duration, Instant};

use bastion_shared::{Vec2, Vec3};

use crate::assignment::Assignment;
use crate::config::{DistributionConfig, ScatterConfig};
use crate::orchestrator::{ChunkOrchestrator, Completion, JobId, JobSpec, JobState};
use crate::poisson::{uniform_in_disk, PoissonSampler};
use crate::scatter::{PropPlacement, Scatter};
use crate::seed::GenerationSeed;

/// Sub-seed purpose for site placement.
const PLACEMENT_STREAM: u64 = 0x0050_4c41_4345;

/// Longest a single wait inside [`BatchDistributor::run_to_completion`] blocks.
const WAIT_SLICE: Duration = Duration::from_millis(50);

/// Cap on the time-based share of an in-flight unit.
const IN_FLIGHT_CEILING: f32 = 0.95;

/// A finished structure with its props.
#[derive(Clone, Debug)]
pub struct PlacedStructure {
    /// Index of the unit within its batch.
    pub unit: u32,
    /// The generation job that built it.
    pub job: JobId,
    /// Site on the ground plane.
    pub site: Vec2,
    /// World position of the grid's minimum corner.
    pub origin: Vec3,
    /// The generated cells.
    pub assignment: Assignment,
    /// Props scattered on top.
    pub props: Vec<PropPlacement>,
}

/// Totals for one batch.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BatchSummary {
    /// Units submitted.
    pub total: usize,
    /// Units that generated and were scattered.
    pub succeeded: usize,
    /// Units whose generation failed or was cancelled.
    pub failed: usize,
    /// Props placed over all structures.
    pub props: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum UnitState {
    Pending,
    Succeeded,
    Failed,
}

#[derive(Clone, Debug)]
struct Unit {
    job: JobId,
    site: Vec2,
    submitted: Instant,
    state: UnitState,
}

type ProgressFn<'o> = Box<dyn FnMut(usize, usize) + 'o>;
type CompleteFn<'o> = Box<dyn FnMut() + 'o>;
type StructureFn<'o> = Box<dyn FnMut(&PlacedStructure) + 'o>;

/// Places and tracks batches of structures.
pub struct BatchDistributor<'o> {
    orchestrator: &'o ChunkOrchestrator,
    config: DistributionConfig,
    scatter: Scatter,
    batch: u32,
    seed: GenerationSeed,
    units: Vec<Unit>,
    completed: usize,
    finished: bool,
    structures: Vec<PlacedStructure>,
    on_progress: Option<ProgressFn<'o>>,
    on_complete: Option<CompleteFn<'o>>,
    on_structure: Option<StructureFn<'o>>,
}

impl<'o> BatchDistributor<'o> {
    /// Creates a distributor feeding `orchestrator`.
    #[must_use]
    pub fn new(orchestrator: &'o ChunkOrchestrator, config: DistributionConfig, scatter: ScatterConfig) -> Self {
        let outside_tag = orchestrator.generator_config().boundary.outside_tag.clone();
        Self {
            orchestrator,
            config,
            scatter: Scatter::new(scatter, outside_tag),
            batch: 0,
            seed: GenerationSeed::default(),
            units: Vec::new(),
            completed: 0,
            finished: true,
            structures: Vec::new(),
            on_progress: None,
            on_complete: None,
            on_structure: None,
        }
    }

    /// Called with `(completed, total)` each time a unit finishes.
    pub fn on_progress(&mut self, callback: impl FnMut(usize, usize) + 'o) {
        self.on_progress = Some(Box::new(callback));
    }

    /// Called once per batch, after every unit finished.
    pub fn on_complete(&mut self, callback: impl FnMut() + 'o) {
        self.on_complete = Some(Box::new(callback));
    }

    /// Called with each successfully placed structure.
    pub fn on_structure(&mut self, callback: impl FnMut(&PlacedStructure) + 'o) {
        self.on_structure = Some(Box::new(callback));
    }

    /// Starts a new batch of up to `count` structures inside `radius`.
    ///
    /// Forgets the previous batch; its late results are ignored. Returns the
    /// number of units actually submitted, which is lower than `count` when
    /// the disk cannot hold that many sites.
    #[allow(clippy::cast_possible_truncation)]
    pub fn generate_all(&mut self, count: usize, radius: f32, min_distance: f32, seed: GenerationSeed) -> usize {
        self.batch = (self.batch + 1) & 0x7FFF_FFFF;
        self.seed = seed;
        self.units.clear();
        self.structures.clear();
        self.completed = 0;
        self.finished = false;

        let sites = self.sample_sites(count, radius, min_distance);
        let size = self.orchestrator.generator_config().grid_size;
        let now = Instant::now();

        for (index, site) in sites.into_iter().enumerate() {
            // Bounded by the site count, which is far below u32::MAX in practice.
            let unit = index as u32;
            let job = JobId::for_batch(self.batch, unit);
            let spec = JobSpec {
                id: job,
                priority: -(site.distance(self.config.center) as i32),
                size,
                seed: seed.derive(u64::from(unit)),
            };
            let state = if self.orchestrator.request(spec) {
                UnitState::Pending
            } else {
                UnitState::Failed
            };
            self.units.push(Unit {
                job,
                site,
                submitted: now,
                state,
            });
        }

        let total = self.units.len();
        tracing::info!(batch = self.batch, requested = count, total, "batch started");

        let refused = self.units.iter().filter(|u| u.state == UnitState::Failed).count();
        for _ in 0..refused {
            self.advance_counter();
        }
        self.check_finished();
        total
    }

    fn sample_sites(&self, count: usize, radius: f32, min_distance: f32) -> Vec<Vec2> {
        let mut rng = self.seed.derive(PLACEMENT_STREAM).rng();
        let wanted = count.min(self.config.candidate_cap);
        if self.config.avoid_overlap {
            PoissonSampler::new(self.config.center, radius, min_distance)
                .with_max_attempts(self.config.max_attempts)
                .with_cap(wanted)
                .sample(&mut rng)
        } else {
            uniform_in_disk(&mut rng, self.config.center, radius, wanted)
        }
    }

    /// Handles up to one drain budget of finished jobs. Returns how many
    /// units completed during this call.
    pub fn pump(&mut self) -> usize {
        let mut drained = Vec::new();
        let budget = self.orchestrator.config().drain_per_tick;
        self.orchestrator.drain(budget, |completion| drained.push(completion));
        self.absorb(drained)
    }

    fn absorb(&mut self, drained: Vec<Completion>) -> usize {
        let before = self.completed;
        for completion in drained {
            self.handle(completion);
        }
        self.reap_cancelled();
        self.check_finished();
        self.completed - before
    }

    fn handle(&mut self, completion: Completion) {
        let orchestrator = self.orchestrator;
        let job = completion.job;
        orchestrator.release(job);

        let Some(index) = self.unit_index(job) else {
            tracing::debug!(%job, "ignoring completion from another batch");
            return;
        };

        match completion.outcome {
            Ok(assignment) => {
                let structure = self.place(index, job, assignment);
                if let Some(callback) = self.on_structure.as_mut() {
                    callback(&structure);
                }
                self.structures.push(structure);
                self.units[index].state = UnitState::Succeeded;
            }
            Err(error) => {
                tracing::warn!(%job, %error, "unit failed");
                self.units[index].state = UnitState::Failed;
            }
        }
        self.advance_counter();
    }

    fn unit_index(&self, job: JobId) -> Option<usize> {
        if job.batch() != Some(self.batch) {
            return None;
        }
        let index = usize::try_from(job.unit()?).ok()?;
        let unit = self.units.get(index)?;
        (unit.job == job && unit.state == UnitState::Pending).then_some(index)
    }

    #[allow(clippy::cast_precision_loss)]
    fn place(&self, index: usize, job: JobId, assignment: Assignment) -> PlacedStructure {
        let size = assignment.size();
        let site = self.units[index].site;
        let cell = self.config.cell_size;
        let origin = Vec3::new(
            site.x - size.x as f32 * cell * 0.5,
            self.config.ground_height,
            site.y - size.z as f32 * cell * 0.5,
        );
        let mut rng = self.seed.derive(job.0).rng();
        let props = self
            .scatter
            .place(&assignment, self.orchestrator.catalog(), origin, cell, &mut rng);
        PlacedStructure {
            unit: job.unit().unwrap_or_default(),
            job,
            site,
            origin,
            assignment,
            props,
        }
    }

    /// Units whose job was cancelled behind our back will never report.
    fn reap_cancelled(&mut self) {
        let orchestrator = self.orchestrator;
        let mut reaped = 0;
        for unit in &mut self.units {
            if unit.state == UnitState::Pending && orchestrator.state(unit.job) == Some(JobState::Cancelled) {
                orchestrator.release(unit.job);
                unit.state = UnitState::Failed;
                reaped += 1;
            }
        }
        for _ in 0..reaped {
            self.advance_counter();
        }
    }

    fn advance_counter(&mut self) {
        let total = self.units.len();
        if self.completed >= total {
            return;
        }
        self.completed += 1;
        if let Some(callback) = self.on_progress.as_mut() {
            callback(self.completed, total);
        }
    }

    fn check_finished(&mut self) {
        if self.finished || self.completed < self.units.len() {
            return;
        }
        self.finished = true;
        let summary = self.summary();
        tracing::info!(
            batch = self.batch,
            succeeded = summary.succeeded,
            failed = summary.failed,
            props = summary.props,
            "batch complete"
        );
        if let Some(callback) = self.on_complete.as_mut() {
            callback();
        }
    }

    /// Pumps until every unit of the current batch is done.
    pub fn run_to_completion(&mut self) -> BatchSummary {
        let budget = self.orchestrator.config().drain_per_tick;
        while !self.finished {
            let mut drained = Vec::new();
            self.orchestrator
                .drain_timeout(budget, WAIT_SLICE, |completion| drained.push(completion));
            self.absorb(drained);
        }
        self.summary()
    }

    /// True once every unit of the current batch is done.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.finished
    }

    /// Units done so far.
    #[must_use]
    pub fn completed(&self) -> usize {
        self.completed
    }

    /// Units in the current batch.
    #[must_use]
    pub fn total(&self) -> usize {
        self.units.len()
    }

    /// Structures placed so far in the current batch.
    #[must_use]
    pub fn structures(&self) -> &[PlacedStructure] {
        &self.structures
    }

    /// Totals for the current batch.
    #[must_use]
    pub fn summary(&self) -> BatchSummary {
        BatchSummary {
            total: self.units.len(),
            succeeded: self.units.iter().filter(|u| u.state == UnitState::Succeeded).count(),
            failed: self.units.iter().filter(|u| u.state == UnitState::Failed).count(),
            props: self.structures.iter().map(|s| s.props.len()).sum(),
        }
    }

    /// Approximate progress in `[0, 1]` for display.
    ///
    /// Finished units count fully. Each pending unit adds a share that grows
    /// with its age against the expected unit time, capped below one, so the
    /// value keeps moving while workers are busy.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn overall_progress(&self, now: Instant) -> f32 {
        let total = self.units.len();
        if total == 0 {
            return 1.0;
        }
        let expected = self.config.estimated_unit_secs.max(f32::EPSILON);
        let in_flight: f32 = self
            .units
            .iter()
            .filter(|u| u.state == UnitState::Pending)
            .map(|u| {
                let age = now.saturating_duration_since(u.submitted).as_secs_f32();
                (age / expected).min(IN_FLIGHT_CEILING)
            })
            .sum();
        ((self.completed as f32 + in_flight) / total as f32).clamp(0.0, 1.0)
    }
}

impl std::fmt::Debug for BatchDistributor<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchDistributor")
            .field("batch", &self.batch)
            .field("completed", &self.completed)
            .field("total", &self.units.len())
            .field("finished", &self.finished)
            .finish_non_exhaustive()
    }
}
