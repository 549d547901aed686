//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use bastion_procedural::{Catalog, Direction, PrototypeRecord, WaveGrid};

/// Builds a catalog from `(name, record)` pairs.
pub fn catalog(records: Vec<(&str, PrototypeRecord)>) -> Arc<Catalog> {
    Arc::new(Catalog::from_records(records.into_iter().map(|(n, r)| (n.to_string(), r))).unwrap())
}

/// Every prototype may sit next to every other one in every direction.
pub fn permissive(names: &[&str]) -> Arc<Catalog> {
    catalog(
        names
            .iter()
            .map(|&n| (n, PrototypeRecord::open(1).with_all_neighbours(names)))
            .collect(),
    )
}

/// A single prototype that allows nothing above itself.
///
/// Any grid taller than one layer is a guaranteed contradiction.
pub fn dead_end() -> Arc<Catalog> {
    catalog(vec![(
        "cap",
        PrototypeRecord::open(1)
            .with_all_neighbours(&["cap"])
            .with_neighbours(Direction::PosY, &[]),
    )])
}

/// Path of a file under the workspace `data/` directory.
pub fn data(path: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("../../data").join(path)
}

/// The bundled ruins catalog.
pub fn ruins() -> Arc<Catalog> {
    Arc::new(Catalog::load(data("catalog/ruins.json")).unwrap())
}

/// Panics unless every cell's neighbours only hold candidates that the
/// cell's own candidates allow in that direction.
pub fn assert_arc_consistent(grid: &WaveGrid) {
    let size = grid.size();
    let catalog = grid.catalog();
    for coord in size.coords() {
        let here = grid.candidates(coord);
        for dir in Direction::ALL {
            let Some(next) = size.step(coord, dir) else {
                continue;
            };
            let allowed = catalog.neighbour_union(here, dir);
            let there = grid.candidates(next);
            assert_eq!(
                there & allowed,
                there,
                "cell {next} holds candidates {coord} does not allow towards {}",
                dir.face_name()
            );
        }
    }
}
