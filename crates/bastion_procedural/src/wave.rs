//! # Wave Grid
//!
//! The candidate-set model at the heart of generation.
//!
//! ## Algorithm
//!
//! Every cell starts with the full catalog as its candidate set. Each
//! [`WaveGrid::iterate`] call makes exactly one cell of irreversible
//! progress:
//!
//! 1. **Select** the uncollapsed cell with the lowest noisy entropy.
//! 2. **Collapse** it to the candidate with the highest noisy weight.
//! 3. **Propagate** the change outward until every touched neighbour agrees.
//!
//! There is no backtracking. A cell that loses its last candidate is a
//! [`GenerationError::Contradiction`] and ends the run.
//!
//! ## Reproducibility
//!
//! Both noise bands are fixed constants. Changing either one changes every
//! seeded output, so they are part of the output format just like the
//! direction indices.

use std::sync::Arc;

use rand::Rng;
use rand_chacha::ChaCha8Rng;

use crate::assignment::Assignment;
use crate::catalog::Catalog;
use crate::error::{GenerationError, GenerationResult};
use crate::grid::{Direction, GridCoord, GridSize};
use crate::prototype_set::{PrototypeId, PrototypeSet};
use crate::seed::GenerationSeed;

/// Half-width of the uniform noise added to entropy during cell selection.
pub const SELECTION_NOISE: f64 = 0.1;

/// Half-width of the uniform noise added to weight during collapse.
pub const COLLAPSE_NOISE: f64 = 1.0;

/// Result of one [`WaveGrid::iterate`] call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IterateOutcome {
    /// A cell was collapsed and its consequences propagated.
    Progressed(GridCoord),
    /// No cell had more than one candidate left.
    AlreadyCollapsed,
}

/// A grid of candidate sets owned by one generation run.
///
/// Holds only plain data plus a shared handle to the immutable catalog, so a
/// grid can be moved to a worker thread and driven there.
#[derive(Clone, Debug)]
pub struct WaveGrid {
    catalog: Arc<Catalog>,
    size: GridSize,
    cells: Vec<PrototypeSet>,
    rng: ChaCha8Rng,
    /// Propagation worklist (flat indices).
    worklist: Vec<usize>,
    /// Per-cell "already on the worklist" flags.
    queued: Vec<bool>,
}

impl WaveGrid {
    /// Creates a grid where every cell may still be any prototype.
    ///
    /// # Errors
    ///
    /// Returns [`GenerationError::InvalidSize`] if a dimension is zero or the
    /// cell count overflows.
    pub fn new(size: GridSize, catalog: Arc<Catalog>, seed: GenerationSeed) -> GenerationResult<Self> {
        if !size.is_valid() {
            return Err(GenerationError::InvalidSize(size));
        }
        let cells = vec![catalog.all(); size.cell_count()];
        Ok(Self {
            queued: vec![false; cells.len()],
            cells,
            catalog,
            size,
            rng: seed.rng(),
            worklist: Vec::new(),
        })
    }

    /// Grid dimensions.
    #[inline]
    #[must_use]
    pub const fn size(&self) -> GridSize {
        self.size
    }

    /// The catalog this grid draws from.
    #[inline]
    #[must_use]
    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    /// Remaining candidates at `coord`.
    #[inline]
    #[must_use]
    pub fn candidates(&self, coord: GridCoord) -> PrototypeSet {
        self.cells[self.size.index(coord)]
    }

    /// Number of remaining candidates at `coord`.
    #[inline]
    #[must_use]
    pub fn entropy(&self, coord: GridCoord) -> usize {
        self.candidates(coord).len()
    }

    /// True iff every cell has exactly one candidate.
    #[must_use]
    pub fn is_collapsed(&self) -> bool {
        self.cells.iter().all(|set| set.len() == 1)
    }

    /// Number of cells with exactly one candidate.
    #[must_use]
    pub fn collapsed_count(&self) -> usize {
        self.cells.iter().filter(|set| set.len() == 1).count()
    }

    /// The settled prototype at `coord`, if the cell is collapsed.
    #[must_use]
    pub fn collapsed_prototype(&self, coord: GridCoord) -> Option<PrototypeId> {
        let set = self.candidates(coord);
        if set.len() == 1 {
            set.first()
        } else {
            None
        }
    }

    /// First cell (in storage order) with no candidates left.
    #[must_use]
    pub fn first_contradiction(&self) -> Option<GridCoord> {
        self.cells
            .iter()
            .position(PrototypeSet::is_empty)
            .map(|index| self.size.coord(index))
    }

    /// Picks the uncollapsed cell with the lowest noisy entropy.
    ///
    /// Scans in storage order; ties after noise go to the first cell seen.
    /// Returns `None` when no cell has more than one candidate.
    #[allow(clippy::cast_precision_loss)]
    pub fn select_min_entropy_cell(&mut self) -> Option<GridCoord> {
        let mut best: Option<(usize, f64)> = None;
        for (index, set) in self.cells.iter().enumerate() {
            let entropy = set.len();
            if entropy <= 1 {
                continue;
            }
            let score = entropy as f64 + self.rng.gen_range(-SELECTION_NOISE..SELECTION_NOISE);
            if best.map_or(true, |(_, lowest)| score < lowest) {
                best = Some((index, score));
            }
        }
        best.map(|(index, _)| self.size.coord(index))
    }

    /// Collapses `coord` to its highest noisy-weight candidate.
    ///
    /// Candidates are scored in ascending index order and the first strict
    /// maximum wins.
    ///
    /// # Errors
    ///
    /// Returns [`GenerationError::Contradiction`] if the cell is already empty.
    pub fn collapse(&mut self, coord: GridCoord) -> GenerationResult<PrototypeId> {
        let index = self.size.index(coord);
        let mut winner: Option<(PrototypeId, f64)> = None;
        for id in &self.cells[index] {
            let weight = f64::from(self.catalog.get(id).weight);
            let score = weight + self.rng.gen_range(-COLLAPSE_NOISE..COLLAPSE_NOISE);
            if winner.map_or(true, |(_, highest)| score > highest) {
                winner = Some((id, score));
            }
        }
        let (id, _) = winner.ok_or(GenerationError::Contradiction { coord })?;
        self.cells[index] = PrototypeSet::single(id);
        Ok(id)
    }

    /// Removes one candidate from `coord`. Returns true if it was present.
    ///
    /// # Errors
    ///
    /// Returns [`GenerationError::Contradiction`] if the cell ends up empty.
    pub fn constrain(&mut self, coord: GridCoord, id: PrototypeId) -> GenerationResult<bool> {
        let mut mask = self.catalog.all();
        mask.remove(id);
        self.constrain_to_mask(coord, mask)
    }

    /// Keeps only the candidates of `coord` that are also in `mask`.
    /// Returns true if anything was removed.
    ///
    /// # Errors
    ///
    /// Returns [`GenerationError::Contradiction`] if the cell ends up empty.
    pub fn constrain_to_mask(&mut self, coord: GridCoord, mask: PrototypeSet) -> GenerationResult<bool> {
        let index = self.size.index(coord);
        self.restrict(index, mask)
    }

    fn restrict(&mut self, index: usize, mask: PrototypeSet) -> GenerationResult<bool> {
        let before = self.cells[index];
        if before.is_empty() {
            return Err(GenerationError::Contradiction {
                coord: self.size.coord(index),
            });
        }
        let after = before & mask;
        if after == before {
            return Ok(false);
        }
        self.cells[index] = after;
        if after.is_empty() {
            return Err(GenerationError::Contradiction {
                coord: self.size.coord(index),
            });
        }
        Ok(true)
    }

    /// Propagates the constraints of `origin` through the grid.
    ///
    /// # Errors
    ///
    /// Returns [`GenerationError::Contradiction`] for the first cell emptied.
    pub fn propagate(&mut self, origin: GridCoord) -> GenerationResult<()> {
        self.propagate_from(std::iter::once(origin))
    }

    /// Propagates from several changed cells at once.
    ///
    /// # Errors
    ///
    /// Returns [`GenerationError::Contradiction`] for the first cell emptied.
    pub fn propagate_from<I>(&mut self, origins: I) -> GenerationResult<()>
    where
        I: IntoIterator<Item = GridCoord>,
    {
        for coord in origins {
            let index = self.size.index(coord);
            self.enqueue(index);
        }
        let result = self.drain_worklist();
        if result.is_err() {
            for index in self.worklist.drain(..) {
                self.queued[index] = false;
            }
        }
        result
    }

    #[inline]
    fn enqueue(&mut self, index: usize) {
        if !self.queued[index] {
            self.queued[index] = true;
            self.worklist.push(index);
        }
    }

    fn drain_worklist(&mut self) -> GenerationResult<()> {
        while let Some(index) = self.worklist.pop() {
            self.queued[index] = false;
            let coord = self.size.coord(index);
            let here = self.cells[index];
            for dir in Direction::ALL {
                let Some(next) = self.size.step(coord, dir) else {
                    continue;
                };
                let allowed = self.catalog.neighbour_union(here, dir);
                let neighbour = self.size.index(next);
                if self.restrict(neighbour, allowed)? {
                    self.enqueue(neighbour);
                }
            }
        }
        Ok(())
    }

    /// Select, collapse, propagate: one cell of progress.
    ///
    /// # Errors
    ///
    /// Returns [`GenerationError::Contradiction`] if propagation empties a
    /// cell, or if the grid already holds an empty cell and nothing is left
    /// to collapse.
    pub fn iterate(&mut self) -> GenerationResult<IterateOutcome> {
        let Some(coord) = self.select_min_entropy_cell() else {
            if let Some(coord) = self.first_contradiction() {
                return Err(GenerationError::Contradiction { coord });
            }
            return Ok(IterateOutcome::AlreadyCollapsed);
        };
        self.collapse(coord)?;
        self.propagate(coord)?;
        Ok(IterateOutcome::Progressed(coord))
    }

    /// The final assignment of a collapsed grid.
    ///
    /// # Errors
    ///
    /// Returns [`GenerationError::NotCollapsed`] while any cell is undecided.
    pub fn assignment(&self) -> GenerationResult<Assignment> {
        let cells = self
            .cells
            .iter()
            .map(|set| match set.len() {
                1 => set.first().ok_or(GenerationError::NotCollapsed),
                _ => Err(GenerationError::NotCollapsed),
            })
            .collect::<GenerationResult<Vec<_>>>()?;
        Ok(Assignment::new(self.size, cells))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::PrototypeRecord;

    fn catalog(records: Vec<(&str, PrototypeRecord)>) -> Arc<Catalog> {
        Arc::new(Catalog::from_records(records.into_iter().map(|(n, r)| (n.to_string(), r))).unwrap())
    }

    /// `a` and `b` alternate along X and are free along Y and Z.
    fn pair_catalog() -> Arc<Catalog> {
        catalog(vec![
            (
                "a",
                PrototypeRecord::open(1)
                    .with_all_neighbours(&["a", "b"])
                    .with_neighbours(Direction::PosX, &["b"])
                    .with_neighbours(Direction::NegX, &["b"]),
            ),
            (
                "b",
                PrototypeRecord::open(1)
                    .with_all_neighbours(&["a", "b"])
                    .with_neighbours(Direction::PosX, &["a"])
                    .with_neighbours(Direction::NegX, &["a"]),
            ),
        ])
    }

    #[test]
    fn test_single_cell_single_prototype() {
        let cat = catalog(vec![("x", PrototypeRecord::open(1).with_all_neighbours(&["x"]))]);
        let mut grid = WaveGrid::new(GridSize::new(1, 1, 1), cat, GenerationSeed::new(1)).unwrap();
        assert_eq!(grid.iterate().unwrap(), IterateOutcome::AlreadyCollapsed);
        assert!(grid.is_collapsed());
        assert_eq!(grid.assignment().unwrap().cells(), &[PrototypeId(0)]);
    }

    #[test]
    fn test_propagation_forces_neighbour() {
        let cat = pair_catalog();
        let a = cat.id_of("a").unwrap();
        let b = cat.id_of("b").unwrap();
        let mut grid = WaveGrid::new(GridSize::new(2, 1, 1), cat, GenerationSeed::new(1)).unwrap();
        let origin = GridCoord::new(0, 0, 0);
        assert!(grid.constrain(origin, b).unwrap());
        grid.propagate(origin).unwrap();
        assert_eq!(grid.candidates(GridCoord::new(1, 0, 0)), PrototypeSet::single(b));
        assert_eq!(grid.collapsed_prototype(origin), Some(a));
        assert!(grid.is_collapsed());
    }

    #[test]
    fn test_constrain_last_candidate_is_contradiction() {
        let cat = catalog(vec![("x", PrototypeRecord::open(1))]);
        let mut grid = WaveGrid::new(GridSize::new(1, 1, 1), cat, GenerationSeed::new(1)).unwrap();
        let origin = GridCoord::new(0, 0, 0);
        assert_eq!(
            grid.constrain(origin, PrototypeId(0)),
            Err(GenerationError::Contradiction { coord: origin })
        );
        assert_eq!(grid.entropy(origin), 0);
        assert!(!grid.is_collapsed());
        assert_eq!(grid.first_contradiction(), Some(origin));
    }

    #[test]
    fn test_constrain_on_empty_cell_stays_contradiction() {
        let cat = catalog(vec![
            ("x", PrototypeRecord::open(1).with_all_neighbours(&["x", "y"])),
            ("y", PrototypeRecord::open(1).with_all_neighbours(&["x", "y"])),
        ]);
        let x = cat.id_of("x").unwrap();
        let mut grid = WaveGrid::new(GridSize::new(2, 1, 1), cat, GenerationSeed::new(1)).unwrap();
        let origin = GridCoord::new(0, 0, 0);
        let contradiction = Err(GenerationError::Contradiction { coord: origin });

        assert_eq!(grid.constrain_to_mask(origin, PrototypeSet::EMPTY), contradiction);
        // Nothing left to remove, but the cell is still empty.
        assert_eq!(grid.constrain(origin, x), contradiction);
        assert_eq!(grid.constrain_to_mask(origin, PrototypeSet::EMPTY), contradiction);
        assert!(grid.propagate(GridCoord::new(1, 0, 0)).is_err());
    }

    #[test]
    fn test_collapse_prefers_heavy_weight() {
        let cat = catalog(vec![
            ("heavy", PrototypeRecord::open(100).with_all_neighbours(&["heavy", "light"])),
            ("light", PrototypeRecord::open(1).with_all_neighbours(&["heavy", "light"])),
        ]);
        let heavy = cat.id_of("heavy").unwrap();
        let mut grid = WaveGrid::new(GridSize::new(4, 1, 1), cat, GenerationSeed::new(3)).unwrap();
        for x in 0..4 {
            assert_eq!(grid.collapse(GridCoord::new(x, 0, 0)).unwrap(), heavy);
        }
    }

    #[test]
    fn test_select_skips_collapsed_cells() {
        let cat = catalog(vec![
            ("a", PrototypeRecord::open(1).with_all_neighbours(&["a", "b"])),
            ("b", PrototypeRecord::open(1).with_all_neighbours(&["a", "b"])),
        ]);
        let mut grid = WaveGrid::new(GridSize::new(2, 1, 1), cat, GenerationSeed::new(5)).unwrap();
        grid.collapse(GridCoord::new(0, 0, 0)).unwrap();
        assert_eq!(grid.select_min_entropy_cell(), Some(GridCoord::new(1, 0, 0)));
        grid.collapse(GridCoord::new(1, 0, 0)).unwrap();
        assert_eq!(grid.select_min_entropy_cell(), None);
    }

    #[test]
    fn test_iterate_until_collapsed_is_deterministic() {
        let run = |seed| {
            let mut grid = WaveGrid::new(GridSize::new(4, 3, 4), pair_catalog(), GenerationSeed::new(seed)).unwrap();
            while grid.iterate().unwrap() != IterateOutcome::AlreadyCollapsed {}
            grid.assignment().unwrap()
        };
        assert_eq!(run(11), run(11));
    }

    #[test]
    fn test_assignment_requires_collapse() {
        let mut grid = WaveGrid::new(GridSize::new(2, 1, 1), pair_catalog(), GenerationSeed::new(1)).unwrap();
        assert_eq!(grid.assignment(), Err(GenerationError::NotCollapsed));
        grid.iterate().unwrap();
        assert!(grid.assignment().is_ok());
    }

    #[test]
    fn test_invalid_size_rejected() {
        let err = WaveGrid::new(GridSize::new(0, 2, 2), pair_catalog(), GenerationSeed::new(1)).unwrap_err();
        assert_eq!(err, GenerationError::InvalidSize(GridSize::new(0, 2, 2)));
    }
}
