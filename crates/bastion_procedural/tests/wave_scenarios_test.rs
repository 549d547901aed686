//! # Wave Scenario Tests
//!
//! End-to-end checks of select, collapse and propagate on small grids,
//! plus the bundled ruins catalog.

mod common;

use std::sync::Arc;

use bastion_procedural::{
    ChunkSolver, Direction, GenerationError, GenerationSeed, GeneratorConfig, GridCoord, GridSize,
    IterateOutcome, PrototypeRecord, PrototypeSet, WaveGrid,
};

/// Test: one cell, one self-compatible prototype, one iteration.
#[test]
fn test_single_cell_collapses_in_one_iteration() {
    let catalog = common::permissive(&["solo"]);
    let mut grid = WaveGrid::new(GridSize::new(1, 1, 1), catalog, GenerationSeed::new(1)).unwrap();

    // A lone candidate is already decided; the first iterate reports so.
    assert_eq!(grid.iterate().unwrap(), IterateOutcome::AlreadyCollapsed);
    assert!(grid.is_collapsed());
    assert_eq!(grid.assignment().unwrap().cells().len(), 1);
}

/// Test: collapsing A forces its +X neighbour down to exactly {B}.
#[test]
fn test_collapse_then_propagate_restricts_neighbour() {
    let catalog = common::catalog(vec![
        (
            "a",
            PrototypeRecord::open(1)
                .with_all_neighbours(&["a", "b"])
                .with_neighbours(Direction::PosX, &["b"]),
        ),
        (
            "b",
            PrototypeRecord::open(1)
                .with_all_neighbours(&["a", "b"])
                .with_neighbours(Direction::NegX, &["a"]),
        ),
    ]);
    let a = catalog.id_of("a").unwrap();
    let b = catalog.id_of("b").unwrap();
    let mut grid = WaveGrid::new(GridSize::new(2, 1, 1), Arc::clone(&catalog), GenerationSeed::new(3)).unwrap();

    let origin = GridCoord::new(0, 0, 0);
    grid.constrain_to_mask(origin, PrototypeSet::single(a)).unwrap();
    grid.propagate(origin).unwrap();

    assert_eq!(grid.candidates(GridCoord::new(1, 0, 0)), PrototypeSet::single(b));
    assert_eq!(grid.collapsed_prototype(origin), Some(a));
}

/// Test: an empty adjacency list ends the run with a contradiction, never a
/// partial assignment.
#[test]
fn test_empty_adjacency_reports_contradiction() {
    let config = GeneratorConfig::default();
    let mut solver =
        ChunkSolver::new(common::dead_end(), GridSize::new(2, 3, 2), GenerationSeed::new(5), &config).unwrap();

    let result = solver.run_to_completion();
    assert!(
        matches!(result, Err(GenerationError::Contradiction { .. })),
        "expected contradiction, got {result:?}"
    );
    assert_eq!(solver.extract_final_assignment(), Err(GenerationError::NotCollapsed));
}

/// Test: a contradiction on the raw grid surfaces from iterate as well.
#[test]
fn test_iterate_surfaces_contradiction() {
    // Two candidates per cell, so the grid starts undecided; neither allows
    // anything above it.
    let names = ["p", "q"];
    let catalog = common::catalog(
        names
            .iter()
            .map(|&n| {
                let record = PrototypeRecord::open(1)
                    .with_all_neighbours(&names)
                    .with_neighbours(Direction::PosY, &[]);
                (n, record)
            })
            .collect(),
    );
    let mut grid = WaveGrid::new(GridSize::new(1, 2, 1), catalog, GenerationSeed::new(5)).unwrap();
    let mut outcome = Ok(IterateOutcome::AlreadyCollapsed);
    for _ in 0..4 {
        outcome = grid.iterate();
        if outcome.is_err() {
            break;
        }
    }
    assert!(matches!(outcome, Err(GenerationError::Contradiction { .. })));
    assert!(grid.first_contradiction().is_some());
}

/// Test: every successful iterate leaves the grid arc consistent.
#[test]
fn test_arc_consistency_after_every_iteration() {
    let mut grid = WaveGrid::new(GridSize::new(6, 4, 6), common::ruins(), GenerationSeed::new(21)).unwrap();
    common::assert_arc_consistent(&grid);

    let mut steps = 0;
    while let IterateOutcome::Progressed(coord) = grid.iterate().unwrap() {
        assert!(grid.collapsed_prototype(coord).is_some());
        common::assert_arc_consistent(&grid);
        steps += 1;
        assert!(steps <= 6 * 4 * 6, "iterate made no progress");
    }
    assert!(grid.is_collapsed());
}

/// Test: same seed, same catalog, same size gives the same structure.
#[test]
fn test_generation_is_deterministic() {
    let config = GeneratorConfig::default();
    let run = |seed| {
        ChunkSolver::new(common::ruins(), GridSize::new(8, 4, 8), GenerationSeed::new(seed), &config)
            .unwrap()
            .run_to_completion()
            .unwrap()
    };
    assert_eq!(run(77), run(77));

    let differs = (78..84).any(|seed| run(seed) != run(77));
    assert!(differs, "six other seeds all produced the same structure");
}

/// Test: running out of budget is a timeout, never a contradiction.
#[test]
fn test_timeout_and_contradiction_are_distinct() {
    let config = GeneratorConfig::default();

    let mut starved = ChunkSolver::new(
        common::permissive(&["a", "b", "c"]),
        GridSize::new(4, 4, 4),
        GenerationSeed::new(2),
        &config,
    )
    .unwrap()
    .with_budget(3);
    assert_eq!(
        starved.run_to_completion(),
        Err(GenerationError::Timeout { iterations: 3, budget: 3 })
    );

    let mut doomed =
        ChunkSolver::new(common::dead_end(), GridSize::new(1, 2, 1), GenerationSeed::new(2), &config).unwrap();
    assert!(matches!(
        doomed.run_to_completion(),
        Err(GenerationError::Contradiction { .. })
    ));
}

/// Test: the bundled ruins catalog loads with indices in name order.
#[test]
fn test_ruins_catalog_loads() {
    let catalog = common::ruins();
    assert_eq!(catalog.len(), 6);
    let names: Vec<&str> = catalog.iter().map(|(_, p)| p.name.as_str()).collect();
    assert_eq!(names, vec!["empty", "floor", "pillar", "roof", "wall_x", "wall_z"]);
}

/// Test: ruins structures respect the outer faces and the layer rules.
#[test]
fn test_ruins_structures_respect_boundary() {
    let catalog = common::ruins();
    let config = GeneratorConfig::default();
    let size = config.grid_size;
    let top = size.y - 1;

    for seed in 0..8 {
        let assignment = ChunkSolver::new(Arc::clone(&catalog), size, GenerationSeed::new(seed), &config)
            .unwrap()
            .run_to_completion()
            .unwrap();

        for (coord, id) in assignment.iter() {
            let prototype = catalog.get(id);
            for dir in Direction::ALL {
                if size.on_face(coord, dir) {
                    assert_eq!(
                        prototype.face(dir),
                        "-1",
                        "{} at {coord} is closed towards {}",
                        prototype.name,
                        dir.face_name()
                    );
                }
            }
            match prototype.name.as_str() {
                "roof" => assert_eq!(coord.y, top, "roof below the top layer at {coord}"),
                "floor" => assert_eq!(coord.y, 0, "floor above the bottom layer at {coord}"),
                "pillar" => assert_ne!(coord.y, top, "pillar in the top layer at {coord}"),
                _ => {}
            }
        }

        let named = assignment.to_named(&catalog).unwrap();
        assert_eq!(named.len(), size.cell_count());
    }
}
