//! # Generation Error Types
//!
//! All errors that can occur while loading a catalog, generating a
//! structure, persisting a result or reading configuration.

use thiserror::Error;

use crate::grid::{GridCoord, GridSize};

/// Errors raised while loading a prototype catalog.
///
/// A catalog that fails to load is never partially populated.
#[derive(Error, Debug)]
pub enum CatalogError {
    /// The catalog file could not be read.
    #[error("failed to read catalog: {0}")]
    Io(#[from] std::io::Error),

    /// The JSON source is malformed or misses a required field.
    #[error("malformed JSON catalog: {0}")]
    Json(#[from] serde_json::Error),

    /// The TOML source is malformed or misses a required field.
    #[error("malformed TOML catalog: {0}")]
    Toml(#[from] toml::de::Error),

    /// A prototype does not declare exactly one neighbour list per direction.
    #[error("prototype {prototype}: expected 6 neighbour lists, found {found}")]
    NeighbourCount {
        /// The offending prototype.
        prototype: String,
        /// Number of lists found.
        found: usize,
    },

    /// A neighbour list references a prototype that does not exist.
    #[error("prototype {prototype}: unknown neighbour {neighbour}")]
    UnknownNeighbour {
        /// The prototype holding the list.
        prototype: String,
        /// The unresolved name.
        neighbour: String,
    },

    /// The catalog does not fit the fixed-width candidate bitset.
    #[error("catalog holds {count} prototypes, limit is {limit}")]
    TooManyPrototypes {
        /// Number of prototypes in the source.
        count: usize,
        /// Maximum supported.
        limit: usize,
    },

    /// The catalog has no prototypes at all.
    #[error("catalog is empty")]
    Empty,

    /// The file extension does not name a known catalog format.
    #[error("unsupported catalog format: {0}")]
    UnsupportedFormat(String),
}

/// Errors that terminate one generation run.
///
/// None of these are retried inside the core. A caller wanting another
/// outcome submits a fresh job with a different seed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GenerationError {
    /// A cell ran out of candidates.
    #[error("contradiction at {coord}: no candidates remain")]
    Contradiction {
        /// The emptied cell.
        coord: GridCoord,
    },

    /// The iteration budget was exhausted before the grid collapsed.
    #[error("iteration budget exhausted after {iterations} iterations (budget {budget})")]
    Timeout {
        /// Iterations performed.
        iterations: usize,
        /// Budget in force.
        budget: usize,
    },

    /// The run observed the cancellation signal.
    #[error("generation cancelled")]
    Cancelled,

    /// A final assignment was requested from a grid that is not collapsed.
    #[error("grid is not fully collapsed")]
    NotCollapsed,

    /// The requested grid has a zero dimension or is too large to index.
    #[error("invalid grid size {0}")]
    InvalidSize(GridSize),
}

impl GenerationError {
    /// True for outcomes that end a run for good: contradiction and timeout.
    #[inline]
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Contradiction { .. } | Self::Timeout { .. })
    }
}

/// Result type for generation operations.
pub type GenerationResult<T> = Result<T, GenerationError>;

/// Errors raised while saving or loading a finished assignment.
#[derive(Error, Debug)]
pub enum AssignmentError {
    /// File operations failed.
    #[error("assignment io failed: {0}")]
    Io(#[from] std::io::Error),

    /// The compressed payload is damaged or not an assignment at all.
    #[error("corrupt assignment data: {0}")]
    Corrupt(String),
}

/// Errors raised while reading configuration files.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read configuration: {0}")]
    Io(#[from] std::io::Error),

    /// The TOML source is malformed.
    #[error("malformed configuration: {0}")]
    Toml(#[from] toml::de::Error),

    /// A value is out of its valid range.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}
