//! # BASTION Procedural Generation
//!
//! Constraint-propagation structure generation over a catalog of tagged
//! building blocks, run concurrently and spread across a world.
//!
//! ## Design Principles
//!
//! 1. **Deterministic**: Same seed, catalog and size always produce the same structure
//! 2. **Greedy**: One pass, no backtracking; a contradiction ends the run
//! 3. **Shared-nothing**: Each run owns its grid; only the catalog is shared
//! 4. **Bounded**: Every run has an iteration budget, every drain a result cap
//!
//! ## Core Components
//!
//! - `Catalog`: Immutable prototypes with precomputed adjacency masks
//! - `WaveGrid`: Candidate sets, entropy selection, collapse, propagation
//! - `BoundaryConstraints`: Closes the grid off from the outside
//! - `ChunkSolver`: Budgeted, cancellable run of one grid
//! - `ChunkOrchestrator`: Worker pool with priority queue and bounded drain
//! - `BatchDistributor`: Poisson-disk placement and batch progress
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use bastion_procedural::{BastionConfig, BatchDistributor, Catalog, ChunkOrchestrator, GenerationSeed};
//!
//! let config = BastionConfig::load("data/config/bastion.toml")?;
//! let catalog = Arc::new(Catalog::load("data/catalog/ruins.json")?);
//! let orchestrator = ChunkOrchestrator::new(catalog, config.generator, config.orchestrator)?;
//!
//! let mut distributor = BatchDistributor::new(&orchestrator, config.distribution, config.scatter);
//! distributor.on_progress(|done, total| println!("{done}/{total}"));
//! distributor.generate_all(12, 200.0, 40.0, GenerationSeed::new(7));
//! let summary = distributor.run_to_completion();
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod assignment;
pub mod boundary;
pub mod catalog;
pub mod config;
pub mod distributor;
pub mod error;
pub mod grid;
pub mod orchestrator;
pub mod poisson;
pub mod prototype_set;
pub mod scatter;
pub mod seed;
pub mod solver;
pub mod wave;

pub use assignment::Assignment;
pub use boundary::BoundaryConstraints;
pub use catalog::{Catalog, LayerTag, Prototype, PrototypeRecord};
pub use config::{
    BastionConfig, BoundaryConfig, DistributionConfig, GeneratorConfig, OrchestratorConfig, ScatterConfig,
};
pub use distributor::{BatchDistributor, BatchSummary, PlacedStructure};
pub use error::{AssignmentError, CatalogError, ConfigError, GenerationError, GenerationResult};
pub use grid::{Direction, GridCoord, GridSize};
pub use orchestrator::{ChunkOrchestrator, Completion, JobId, JobSpec, JobState, OrchestratorStats};
pub use poisson::PoissonSampler;
pub use prototype_set::{PrototypeId, PrototypeSet, MAX_PROTOTYPES};
pub use scatter::{PropPlacement, Scatter};
pub use seed::GenerationSeed;
pub use solver::{ChunkSolver, RunState};
pub use wave::{IterateOutcome, WaveGrid, COLLAPSE_NOISE, SELECTION_NOISE};
