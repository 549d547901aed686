//! # Prop Scatter
//!
//! Post-placement pass that runs on a finished structure: picks walkable
//! top surfaces and drops small props onto them.
//!
//! A cell is walkable when its prototype is open on top but is not open on
//! every side (pure air), and the cell above it is either outside the grid
//! or pure air.

use bastion_shared::Vec3;
use rand::Rng;

use crate::assignment::Assignment;
use crate::catalog::{Catalog, Prototype};
use crate::config::ScatterConfig;
use crate::grid::{Direction, GridCoord};

/// One prop dropped onto a structure.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PropPlacement {
    /// The cell the prop stands on.
    pub cell: GridCoord,
    /// World position of the prop's base.
    pub position: Vec3,
}

/// Scatters props over finished structures.
#[derive(Clone, Debug)]
pub struct Scatter {
    config: ScatterConfig,
    outside_tag: String,
}

impl Scatter {
    /// Creates a scatter pass. `outside_tag` is the face tag of open faces.
    #[must_use]
    pub fn new(config: ScatterConfig, outside_tag: impl Into<String>) -> Self {
        Self {
            config,
            outside_tag: outside_tag.into(),
        }
    }

    fn is_air(&self, prototype: &Prototype) -> bool {
        prototype.faces.iter().all(|face| *face == self.outside_tag)
    }

    /// Walkable cells of `assignment`, in grid order.
    #[must_use]
    pub fn walkable_cells(&self, assignment: &Assignment, catalog: &Catalog) -> Vec<GridCoord> {
        let size = assignment.size();
        assignment
            .iter()
            .filter(|&(coord, id)| {
                if id.index() >= catalog.len() {
                    return false;
                }
                let prototype = catalog.get(id);
                if prototype.face(Direction::PosY) != self.outside_tag || self.is_air(prototype) {
                    return false;
                }
                match size.step(coord, Direction::PosY).and_then(|above| assignment.get(above)) {
                    None => true,
                    Some(above) => above.index() < catalog.len() && self.is_air(catalog.get(above)),
                }
            })
            .map(|(coord, _)| coord)
            .collect()
    }

    /// Chooses prop spots on `assignment`, placed at `origin` with cubic
    /// cells of `cell_size`.
    #[allow(clippy::cast_precision_loss)]
    pub fn place<R: Rng + ?Sized>(
        &self,
        assignment: &Assignment,
        catalog: &Catalog,
        origin: Vec3,
        cell_size: f32,
        rng: &mut R,
    ) -> Vec<PropPlacement> {
        let density = if self.config.density.is_nan() {
            0.0
        } else {
            f64::from(self.config.density.clamp(0.0, 1.0))
        };
        let mut placements = Vec::new();
        for cell in self.walkable_cells(assignment, catalog) {
            if placements.len() >= self.config.max_props {
                break;
            }
            if !rng.gen_bool(density) {
                continue;
            }
            let jitter_x = rng.gen_range(-0.25..0.25);
            let jitter_z = rng.gen_range(-0.25..0.25);
            let local = Vec3::new(
                cell.x as f32 + 0.5 + jitter_x,
                (cell.y + 1) as f32,
                cell.z as f32 + 0.5 + jitter_z,
            );
            placements.push(PropPlacement {
                cell,
                position: origin + local * cell_size,
            });
        }
        placements
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::PrototypeRecord;
    use crate::grid::GridSize;
    use crate::prototype_set::PrototypeId;
    use crate::seed::GenerationSeed;

    /// `air` (0) is open everywhere; `floor` (1) is open only on top.
    fn catalog() -> Catalog {
        let mut floor = PrototypeRecord::open(1);
        for dir in [Direction::PosX, Direction::NegX, Direction::NegY, Direction::PosZ, Direction::NegZ] {
            floor = floor.with_face(dir, "0");
        }
        Catalog::from_records([
            ("air".to_string(), PrototypeRecord::open(1)),
            ("floor".to_string(), floor),
        ])
        .unwrap()
    }

    fn two_layer() -> Assignment {
        // Bottom layer all floor, top layer floor at x=0 and air at x=1.
        let cells = vec![PrototypeId(1), PrototypeId(1), PrototypeId(1), PrototypeId(0)];
        Assignment::new(GridSize::new(2, 2, 1), cells)
    }

    #[test]
    fn test_walkable_cells() {
        let scatter = Scatter::new(ScatterConfig::default(), "-1");
        let cells = scatter.walkable_cells(&two_layer(), &catalog());
        assert_eq!(cells, vec![GridCoord::new(1, 0, 0), GridCoord::new(0, 1, 0)]);
    }

    #[test]
    fn test_full_density_places_on_every_walkable_cell() {
        let config = ScatterConfig {
            density: 1.0,
            max_props: 10,
        };
        let scatter = Scatter::new(config, "-1");
        let mut rng = GenerationSeed::new(2).rng();
        let origin = Vec3::new(100.0, 0.0, 100.0);
        let props = scatter.place(&two_layer(), &catalog(), origin, 2.0, &mut rng);
        assert_eq!(props.len(), 2);
        let top = props[1];
        assert_eq!(top.cell, GridCoord::new(0, 1, 0));
        assert!((top.position.y - 4.0).abs() < f32::EPSILON);
        assert!(top.position.x > 100.0 && top.position.x < 102.0);
    }

    #[test]
    fn test_max_props_and_zero_density() {
        let mut rng = GenerationSeed::new(2).rng();
        let capped = Scatter::new(ScatterConfig { density: 1.0, max_props: 1 }, "-1");
        assert_eq!(capped.place(&two_layer(), &catalog(), Vec3::ZERO, 1.0, &mut rng).len(), 1);
        let none = Scatter::new(ScatterConfig { density: 0.0, max_props: 10 }, "-1");
        assert!(none.place(&two_layer(), &catalog(), Vec3::ZERO, 1.0, &mut rng).is_empty());
    }
}
