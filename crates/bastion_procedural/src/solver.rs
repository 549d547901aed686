//! # Chunk Solver
//!
//! Drives one [`WaveGrid`] from a fresh state to a final [`Assignment`].
//!
//! ## Drive Modes
//!
//! - **Cooperative**: call [`ChunkSolver::advance`] with a small step count
//!   once per tick to watch a structure assemble.
//! - **Worker**: call [`ChunkSolver::run_until`] on a worker thread; it only
//!   returns on collapse, failure or cancellation.
//!
//! Both modes share one iteration budget, `cells * budget_factor`. Running out
//! of it is a [`GenerationError::Timeout`], never a contradiction.

use std::sync::Arc;

use crate::assignment::Assignment;
use crate::boundary::BoundaryConstraints;
use crate::catalog::Catalog;
use crate::config::GeneratorConfig;
use crate::error::{GenerationError, GenerationResult};
use crate::grid::GridSize;
use crate::seed::GenerationSeed;
use crate::wave::{IterateOutcome, WaveGrid};

/// Progress of a cooperative run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunState {
    /// More iterations are needed.
    InProgress,
    /// Every cell is decided.
    Collapsed,
}

/// A self-contained generation run.
///
/// Owns its grid outright; the only shared data is the read-only catalog.
#[derive(Debug)]
pub struct ChunkSolver {
    grid: WaveGrid,
    boundary: BoundaryConstraints,
    budget: usize,
    iterations: usize,
    prepared: bool,
    failure: Option<GenerationError>,
}

impl ChunkSolver {
    /// Creates a solver for a grid of `size`.
    ///
    /// # Errors
    ///
    /// Returns [`GenerationError::InvalidSize`] for an unusable size.
    pub fn new(
        catalog: Arc<Catalog>,
        size: GridSize,
        seed: GenerationSeed,
        config: &GeneratorConfig,
    ) -> GenerationResult<Self> {
        let boundary = BoundaryConstraints::new(&catalog, &config.boundary);
        let grid = WaveGrid::new(size, catalog, seed)?;
        Ok(Self {
            grid,
            boundary,
            budget: config.budget_for(size),
            iterations: 0,
            prepared: false,
            failure: None,
        })
    }

    /// Replaces the iteration budget.
    #[must_use]
    pub fn with_budget(mut self, budget: usize) -> Self {
        self.budget = budget;
        self
    }

    /// The underlying grid.
    #[inline]
    #[must_use]
    pub fn grid(&self) -> &WaveGrid {
        &self.grid
    }

    /// Iterations performed so far.
    #[inline]
    #[must_use]
    pub const fn iterations(&self) -> usize {
        self.iterations
    }

    /// Iteration budget in force.
    #[inline]
    #[must_use]
    pub const fn budget(&self) -> usize {
        self.budget
    }

    /// The contradiction or timeout that ended this run, if any.
    #[inline]
    #[must_use]
    pub fn failure(&self) -> Option<&GenerationError> {
        self.failure.as_ref()
    }

    /// Applies the boundary pass and settles the initial grid.
    ///
    /// Runs at most once; later calls are no-ops. Called implicitly by the
    /// drive methods.
    ///
    /// # Errors
    ///
    /// Returns [`GenerationError::Contradiction`] if the catalog cannot fill
    /// the grid at all, or the failure that already ended the run.
    pub fn prepare(&mut self) -> GenerationResult<()> {
        self.check_failed()?;
        if self.prepared {
            return Ok(());
        }
        self.prepared = true;
        let result = self.boundary.apply(&mut self.grid).and_then(|_| {
            // Settle every cell once so rules that already exclude each other
            // are caught before the first collapse.
            let size = self.grid.size();
            self.grid.propagate_from(size.coords())
        });
        self.record(result)
    }

    fn check_failed(&self) -> GenerationResult<()> {
        match &self.failure {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }

    /// Keeps the first terminal error so later calls keep reporting it.
    fn record<T>(&mut self, result: GenerationResult<T>) -> GenerationResult<T> {
        if let Err(error) = &result {
            if self.failure.is_none() && error.is_terminal() {
                self.failure = Some(error.clone());
            }
        }
        result
    }

    /// Performs up to `max_steps` iterations.
    ///
    /// # Errors
    ///
    /// Returns [`GenerationError::Contradiction`] or
    /// [`GenerationError::Timeout`].
    pub fn advance(&mut self, max_steps: usize) -> GenerationResult<RunState> {
        self.prepare()?;
        for _ in 0..max_steps {
            if self.step()? == IterateOutcome::AlreadyCollapsed {
                return Ok(RunState::Collapsed);
            }
        }
        if self.grid.is_collapsed() {
            Ok(RunState::Collapsed)
        } else {
            Ok(RunState::InProgress)
        }
    }

    fn step(&mut self) -> GenerationResult<IterateOutcome> {
        let result = self.try_step();
        self.record(result)
    }

    fn try_step(&mut self) -> GenerationResult<IterateOutcome> {
        self.check_failed()?;
        if self.grid.is_collapsed() {
            return Ok(IterateOutcome::AlreadyCollapsed);
        }
        if self.iterations >= self.budget {
            return Err(GenerationError::Timeout {
                iterations: self.iterations,
                budget: self.budget,
            });
        }
        self.iterations += 1;
        self.grid.iterate()
    }

    /// Runs to completion, polling `cancelled` between iterations.
    ///
    /// # Errors
    ///
    /// Returns [`GenerationError::Cancelled`] as soon as `cancelled` reports
    /// true, or the first contradiction or timeout.
    pub fn run_until(&mut self, mut cancelled: impl FnMut() -> bool) -> GenerationResult<Assignment> {
        if cancelled() {
            return Err(GenerationError::Cancelled);
        }
        self.prepare()?;
        loop {
            if cancelled() {
                return Err(GenerationError::Cancelled);
            }
            if self.step()? == IterateOutcome::AlreadyCollapsed {
                return self.extract_final_assignment();
            }
        }
    }

    /// Runs to completion without cancellation.
    ///
    /// # Errors
    ///
    /// Returns the first contradiction or timeout.
    pub fn run_to_completion(&mut self) -> GenerationResult<Assignment> {
        self.run_until(|| false)
    }

    /// The final assignment, once the grid is collapsed.
    ///
    /// # Errors
    ///
    /// Returns [`GenerationError::NotCollapsed`] while cells are undecided.
    pub fn extract_final_assignment(&self) -> GenerationResult<Assignment> {
        self.grid.assignment()
    }
}
