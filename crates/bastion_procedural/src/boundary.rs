//! # Boundary Constraints
//!
//! Closes a fresh grid off from the outside before the first iteration.
//!
//! ## Rules
//!
//! For every cell on an enabled outer face, candidates whose face tag in the
//! outward direction is not the outside tag are removed. Layer tags then
//! restrict candidates by height (Y is up):
//!
//! | Tag                     | Effect                           |
//! |-------------------------|----------------------------------|
//! | `constrain_to = top`    | only in the top layer            |
//! | `constrain_to = bot`    | only in the bottom layer         |
//! | `constrain_from = top`  | never in the top layer           |
//! | `constrain_from = bot`  | never in the bottom layer        |
//!
//! A rule that would empty a cell is skipped for that cell. The pass never
//! creates a contradiction on its own; one can only appear once the changed
//! cells are propagated.

use crate::catalog::{Catalog, LayerTag};
use crate::config::BoundaryConfig;
use crate::error::GenerationResult;
use crate::grid::{Direction, GridCoord};
use crate::prototype_set::PrototypeSet;
use crate::wave::WaveGrid;

/// Precomputed boundary masks for one catalog.
#[derive(Clone, Debug)]
pub struct BoundaryConstraints {
    config: BoundaryConfig,
    /// Prototypes whose face in each direction is open to the outside.
    open: [PrototypeSet; 6],
    top_only: PrototypeSet,
    bottom_only: PrototypeSet,
    not_top: PrototypeSet,
    not_bottom: PrototypeSet,
}

impl BoundaryConstraints {
    /// Builds the masks for `catalog`.
    #[must_use]
    pub fn new(catalog: &Catalog, config: &BoundaryConfig) -> Self {
        let open = Direction::ALL.map(|dir| catalog.select(|p| p.face(dir) == config.outside_tag));
        Self {
            open,
            top_only: catalog.select(|p| p.constrain_to == LayerTag::Top),
            bottom_only: catalog.select(|p| p.constrain_to == LayerTag::Bottom),
            not_top: catalog.select(|p| p.constrain_from == LayerTag::Top),
            not_bottom: catalog.select(|p| p.constrain_from == LayerTag::Bottom),
            config: config.clone(),
        }
    }

    fn face_enabled(&self, dir: Direction) -> bool {
        match dir {
            Direction::PosY => self.config.top,
            Direction::NegY => self.config.bottom,
            Direction::PosX | Direction::NegX | Direction::PosZ | Direction::NegZ => self.config.sides,
        }
    }

    /// Candidates `coord` may keep after every rule, honouring the guard.
    fn allowed(&self, grid: &WaveGrid, coord: GridCoord) -> PrototypeSet {
        let size = grid.size();
        let top = size.y - 1;
        let mut set = grid.candidates(coord);

        let mut keep = |mask: PrototypeSet| {
            let narrowed = set & mask;
            if !narrowed.is_empty() {
                set = narrowed;
            }
        };
        let all = grid.catalog().all();

        if self.config.top && size.on_face(coord, Direction::PosY) {
            keep(self.open[Direction::PosY.index()]);
        }
        if self.config.top && coord.y != top {
            keep(all.difference(self.top_only));
        }
        if self.config.bottom && coord.y != 0 {
            keep(all.difference(self.bottom_only));
        }
        if self.config.bottom && size.on_face(coord, Direction::NegY) {
            keep(self.open[Direction::NegY.index()]);
        }
        if self.config.bottom && coord.y == 0 {
            keep(all.difference(self.not_bottom));
        }
        if self.config.top && coord.y == top {
            keep(all.difference(self.not_top));
        }
        for dir in [Direction::PosX, Direction::NegX, Direction::PosZ, Direction::NegZ] {
            if self.face_enabled(dir) && size.on_face(coord, dir) {
                keep(self.open[dir.index()]);
            }
        }
        set
    }

    /// Applies the boundary pass and propagates every changed cell.
    ///
    /// Returns the number of cells the pass narrowed.
    ///
    /// # Errors
    ///
    /// Returns [`crate::GenerationError::Contradiction`] if propagating the
    /// narrowed cells empties another cell.
    pub fn apply(&self, grid: &mut WaveGrid) -> GenerationResult<usize> {
        let size = grid.size();
        let mut changed = Vec::new();
        for coord in size.coords() {
            let allowed = self.allowed(grid, coord);
            if grid.constrain_to_mask(coord, allowed)? {
                changed.push(coord);
            }
        }
        let narrowed = changed.len();
        grid.propagate_from(changed)?;
        tracing::trace!(narrowed, "boundary pass applied");
        Ok(narrowed)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::catalog::PrototypeRecord;
    use crate::grid::GridSize;
    use crate::seed::GenerationSeed;

    fn grid_for(records: Vec<(&str, PrototypeRecord)>, size: GridSize) -> WaveGrid {
        let catalog = Catalog::from_records(records.into_iter().map(|(n, r)| (n.to_string(), r))).unwrap();
        WaveGrid::new(size, Arc::new(catalog), GenerationSeed::new(9)).unwrap()
    }

    fn solid() -> PrototypeRecord {
        let mut record = PrototypeRecord::open(1).with_all_neighbours(&["air", "solid"]);
        for dir in Direction::ALL {
            record = record.with_face(dir, "0");
        }
        record
    }

    #[test]
    fn test_outer_faces_keep_open_prototypes() {
        let mut grid = grid_for(
            vec![
                ("air", PrototypeRecord::open(1).with_all_neighbours(&["air", "solid"])),
                ("solid", solid()),
            ],
            GridSize::new(3, 3, 3),
        );
        let boundary = BoundaryConstraints::new(grid.catalog(), &BoundaryConfig::default());
        let narrowed = boundary.apply(&mut grid).unwrap();
        assert_eq!(narrowed, 26);
        let air = grid.catalog().id_of("air").unwrap();
        assert_eq!(grid.collapsed_prototype(GridCoord::new(0, 1, 1)), Some(air));
        assert_eq!(grid.entropy(GridCoord::new(1, 1, 1)), 2);
    }

    #[test]
    fn test_guard_never_empties_a_cell() {
        let mut grid = grid_for(vec![("solid", solid().with_all_neighbours(&["solid"]))], GridSize::new(2, 2, 2));
        let boundary = BoundaryConstraints::new(grid.catalog(), &BoundaryConfig::default());
        assert_eq!(boundary.apply(&mut grid).unwrap(), 0);
        assert!(grid.is_collapsed());
    }

    #[test]
    fn test_layer_rules() {
        let free = |r: PrototypeRecord| r.with_all_neighbours(&["roof", "floor", "wall", "any"]);
        let mut grid = grid_for(
            vec![
                ("roof", free(PrototypeRecord::open(1).with_constrain_to("top"))),
                ("floor", free(PrototypeRecord::open(1).with_constrain_to("bot"))),
                ("wall", free(PrototypeRecord::open(1).with_constrain_from("bot"))),
                ("any", free(PrototypeRecord::open(1))),
            ],
            GridSize::new(1, 3, 1),
        );
        let catalog = Arc::clone(grid.catalog());
        let id = |name: &str| catalog.id_of(name).unwrap();
        BoundaryConstraints::new(&catalog, &BoundaryConfig::default())
            .apply(&mut grid)
            .unwrap();

        let bottom = grid.candidates(GridCoord::new(0, 0, 0));
        let middle = grid.candidates(GridCoord::new(0, 1, 0));
        let top = grid.candidates(GridCoord::new(0, 2, 0));
        assert_eq!(bottom, [id("floor"), id("any")].into_iter().collect::<PrototypeSet>());
        assert_eq!(middle, [id("wall"), id("any")].into_iter().collect::<PrototypeSet>());
        assert_eq!(top, [id("roof"), id("wall"), id("any")].into_iter().collect::<PrototypeSet>());
    }

    #[test]
    fn test_disabled_sides_are_left_alone() {
        let mut grid = grid_for(
            vec![
                ("air", PrototypeRecord::open(1).with_all_neighbours(&["air", "solid"])),
                ("solid", solid()),
            ],
            GridSize::new(3, 1, 1),
        );
        let config = BoundaryConfig {
            sides: false,
            top: false,
            bottom: false,
            ..BoundaryConfig::default()
        };
        let boundary = BoundaryConstraints::new(grid.catalog(), &config);
        assert_eq!(boundary.apply(&mut grid).unwrap(), 0);
        assert_eq!(grid.entropy(GridCoord::new(0, 0, 0)), 2);
    }
}
