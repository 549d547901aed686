//! # Configuration
//!
//! Typed configuration for every stage, passed in at construction.
//!
//! ## File Format
//!
//! All sections are optional; anything left out keeps its default.
//!
//! ```toml
//! [generator]
//! grid_size = { x = 8, y = 4, z = 8 }
//! budget_factor = 2
//!
//! [generator.boundary]
//! outside_tag = "-1"
//! sides = true
//!
//! [orchestrator]
//! max_concurrent = 4
//! drain_per_tick = 2
//! ```

use std::path::Path;

use bastion_shared::Vec2;
use serde::{Deserialize, Serialize};

use crate::catalog::OPEN_TAG;
use crate::error::ConfigError;
use crate::grid::GridSize;
use crate::seed::GenerationSeed;

/// Which outer faces the boundary pass closes off.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoundaryConfig {
    /// Face tag that means "open to the outside".
    pub outside_tag: String,
    /// Close the four vertical sides (±X, ±Z).
    pub sides: bool,
    /// Close the top face and apply top-layer rules.
    pub top: bool,
    /// Close the bottom face and apply bottom-layer rules.
    pub bottom: bool,
}

impl Default for BoundaryConfig {
    fn default() -> Self {
        Self {
            outside_tag: OPEN_TAG.to_string(),
            sides: true,
            top: true,
            bottom: true,
        }
    }
}

/// Parameters for one generation run.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    /// Default grid size for jobs that do not name one.
    pub grid_size: GridSize,
    /// Iteration budget per cell.
    pub budget_factor: usize,
    /// Boundary pass settings.
    pub boundary: BoundaryConfig,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            grid_size: GridSize::new(8, 4, 8),
            budget_factor: 2,
            boundary: BoundaryConfig::default(),
        }
    }
}

impl GeneratorConfig {
    /// Larger structures for production batches.
    #[must_use]
    pub fn production() -> Self {
        Self {
            grid_size: GridSize::new(16, 6, 16),
            ..Self::default()
        }
    }

    /// Iteration budget for a grid of `size`.
    #[must_use]
    pub fn budget_for(&self, size: GridSize) -> usize {
        size.cell_count().saturating_mul(self.budget_factor)
    }
}

/// Worker pool and drain settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Number of generation worker threads.
    pub max_concurrent: usize,
    /// Completions handed to the materializer per drain call.
    pub drain_per_tick: usize,
    /// Seed that per-job seeds are derived from.
    pub seed: GenerationSeed,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 2,
            drain_per_tick: 4,
            seed: GenerationSeed::default(),
        }
    }
}

impl OrchestratorConfig {
    /// One worker per core (capped), small drain budget to keep ticks flat.
    #[must_use]
    pub fn production() -> Self {
        let cores = std::thread::available_parallelism().map_or(4, std::num::NonZeroUsize::get);
        Self {
            max_concurrent: cores.clamp(1, 8),
            drain_per_tick: 2,
            ..Self::default()
        }
    }
}

/// Placement settings for a batch.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DistributionConfig {
    /// Centre of the distribution disk (ground plane).
    pub center: Vec2,
    /// Use Poisson-disk sampling; uniform sampling otherwise.
    pub avoid_overlap: bool,
    /// Trials per active point before it is retired.
    pub max_attempts: u32,
    /// Hard cap on accepted points per sampling pass.
    pub candidate_cap: usize,
    /// World height structures are placed at.
    pub ground_height: f32,
    /// World size of one grid cell.
    pub cell_size: f32,
    /// Expected generation time of one unit, for progress blending.
    pub estimated_unit_secs: f32,
}

impl Default for DistributionConfig {
    fn default() -> Self {
        Self {
            center: Vec2::ZERO,
            avoid_overlap: true,
            max_attempts: 30,
            candidate_cap: 1_000,
            ground_height: 0.0,
            cell_size: 2.0,
            estimated_unit_secs: 0.5,
        }
    }
}

impl DistributionConfig {
    /// Settings for large world batches.
    #[must_use]
    pub fn production() -> Self {
        Self {
            candidate_cap: 10_000,
            cell_size: 4.0,
            estimated_unit_secs: 2.0,
            ..Self::default()
        }
    }
}

/// Prop scattering settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScatterConfig {
    /// Fraction of walkable cells that receive a prop.
    pub density: f32,
    /// Upper bound on props per structure.
    pub max_props: usize,
}

impl Default for ScatterConfig {
    fn default() -> Self {
        Self {
            density: 0.2,
            max_props: 64,
        }
    }
}

impl ScatterConfig {
    /// Sparser props for production.
    #[must_use]
    pub fn production() -> Self {
        Self {
            density: 0.1,
            max_props: 32,
        }
    }
}

/// Top-level configuration file.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BastionConfig {
    /// Generation settings.
    pub generator: GeneratorConfig,
    /// Worker pool settings.
    pub orchestrator: OrchestratorConfig,
    /// Placement settings.
    pub distribution: DistributionConfig,
    /// Prop scattering settings.
    pub scatter: ScatterConfig,
}

impl BastionConfig {
    /// Production presets for every section.
    #[must_use]
    pub fn production() -> Self {
        Self {
            generator: GeneratorConfig::production(),
            orchestrator: OrchestratorConfig::production(),
            distribution: DistributionConfig::production(),
            scatter: ScatterConfig::production(),
        }
    }

    /// Parses and validates a TOML configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] on malformed TOML or out-of-range values.
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads and validates a TOML configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read or is invalid.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let source = std::fs::read_to_string(path)?;
        Self::from_toml_str(&source)
    }

    /// Checks value ranges.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first bad value.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.generator.grid_size.is_valid() {
            return Err(ConfigError::Invalid(format!(
                "generator.grid_size {} has a zero dimension",
                self.generator.grid_size
            )));
        }
        if self.generator.budget_factor == 0 {
            return Err(ConfigError::Invalid("generator.budget_factor must be positive".into()));
        }
        if self.orchestrator.max_concurrent == 0 {
            return Err(ConfigError::Invalid("orchestrator.max_concurrent must be positive".into()));
        }
        if self.orchestrator.drain_per_tick == 0 {
            return Err(ConfigError::Invalid("orchestrator.drain_per_tick must be positive".into()));
        }
        if self.distribution.max_attempts == 0 {
            return Err(ConfigError::Invalid("distribution.max_attempts must be positive".into()));
        }
        if self.distribution.cell_size.is_nan() || self.distribution.cell_size <= 0.0 {
            return Err(ConfigError::Invalid("distribution.cell_size must be positive".into()));
        }
        if !(0.0..=1.0).contains(&self.scatter.density) {
            return Err(ConfigError::Invalid("scatter.density must be within [0, 1]".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_is_default() {
        assert_eq!(BastionConfig::from_toml_str("").unwrap(), BastionConfig::default());
    }

    #[test]
    fn test_partial_sections() {
        let config = BastionConfig::from_toml_str(
            r#"
            [generator]
            grid_size = { x = 5, y = 2, z = 3 }

            [generator.boundary]
            sides = false

            [orchestrator]
            max_concurrent = 6
            seed = 77

            [distribution]
            center = { x = 10.0, y = -4.0 }
            "#,
        )
        .unwrap();
        assert_eq!(config.generator.grid_size, GridSize::new(5, 2, 3));
        assert_eq!(config.generator.budget_factor, 2);
        assert!(!config.generator.boundary.sides);
        assert!(config.generator.boundary.top);
        assert_eq!(config.generator.boundary.outside_tag, "-1");
        assert_eq!(config.orchestrator.max_concurrent, 6);
        assert_eq!(config.orchestrator.seed, GenerationSeed::new(77));
        assert_eq!(config.distribution.center, Vec2::new(10.0, -4.0));
        assert_eq!(config.distribution.max_attempts, 30);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let err = BastionConfig::from_toml_str("[orchestrator]\nmax_concurrent = 0").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
        let err = BastionConfig::from_toml_str("[scatter]\ndensity = 1.5").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
        let err = BastionConfig::from_toml_str("[generator]\ngrid_size = { x = 0, y = 1, z = 1 }").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_budget_for() {
        let config = GeneratorConfig::default();
        assert_eq!(config.budget_for(GridSize::new(2, 3, 4)), 48);
    }

    #[test]
    fn test_production_is_valid() {
        BastionConfig::production().validate().unwrap();
    }
}
