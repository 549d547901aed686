//! # Batch Run
//!
//! Parses driver arguments and runs one batch end to end.
//!
//! ```text
//! bastion_batch <catalog> [--config FILE] [--count N] [--radius R]
//!               [--spacing D] [--seed S] [--center X,Z] [--out DIR]
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use bastion_procedural::{
    AssignmentError, BastionConfig, BatchDistributor, BatchSummary, Catalog, CatalogError, ChunkOrchestrator,
    ConfigError, GenerationSeed,
};
use bastion_shared::Vec2;
use thiserror::Error;

/// Usage line printed on argument errors.
pub const USAGE: &str = "usage: bastion_batch <catalog.json|catalog.toml> [--config FILE] [--count N] \
                         [--radius R] [--spacing D] [--seed S] [--center X,Z] [--out DIR]";

/// Errors from the driver.
#[derive(Debug, Error)]
pub enum DriverError {
    /// Bad command line.
    #[error("{0}")]
    Usage(String),

    /// The configuration file could not be loaded.
    #[error("config: {0}")]
    Config(#[from] ConfigError),

    /// The catalog could not be loaded.
    #[error("catalog: {0}")]
    Catalog(#[from] CatalogError),

    /// Worker spawn or output directory failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A structure could not be written.
    #[error("save: {0}")]
    Save(#[from] AssignmentError),
}

/// Driver arguments.
#[derive(Clone, Debug, PartialEq)]
pub struct BatchArgs {
    /// Catalog file.
    pub catalog: PathBuf,
    /// Optional TOML configuration; defaults otherwise.
    pub config: Option<PathBuf>,
    /// Structures requested.
    pub count: usize,
    /// Radius of the placement disk.
    pub radius: f32,
    /// Minimum distance between sites.
    pub spacing: f32,
    /// Batch seed.
    pub seed: u64,
    /// Overrides the configured disk centre.
    pub center: Option<Vec2>,
    /// Directory that receives one compressed file per structure.
    pub out: Option<PathBuf>,
}

impl BatchArgs {
    /// Arguments with defaults for everything but the catalog.
    #[must_use]
    pub fn new(catalog: impl Into<PathBuf>) -> Self {
        Self {
            catalog: catalog.into(),
            config: None,
            count: 16,
            radius: 256.0,
            spacing: 48.0,
            seed: 1,
            center: None,
            out: None,
        }
    }

    /// Parses arguments, excluding the program name.
    ///
    /// # Errors
    ///
    /// Returns [`DriverError::Usage`] on a missing catalog, an unknown flag
    /// or a value that does not parse.
    pub fn parse<I>(args: I) -> Result<Self, DriverError>
    where
        I: IntoIterator<Item = String>,
    {
        let mut args = args.into_iter();
        let mut parsed: Option<Self> = None;

        while let Some(arg) = args.next() {
            if !arg.starts_with("--") {
                if parsed.is_some() {
                    return Err(DriverError::Usage(format!("unexpected argument `{arg}`")));
                }
                parsed = Some(Self::new(arg));
                continue;
            }
            let value = args
                .next()
                .ok_or_else(|| DriverError::Usage(format!("`{arg}` needs a value")))?;
            let target = parsed
                .as_mut()
                .ok_or_else(|| DriverError::Usage("the catalog path comes first".into()))?;
            match arg.as_str() {
                "--config" => target.config = Some(PathBuf::from(value)),
                "--count" => target.count = number(&arg, &value)?,
                "--radius" => target.radius = number(&arg, &value)?,
                "--spacing" => target.spacing = number(&arg, &value)?,
                "--seed" => target.seed = number(&arg, &value)?,
                "--center" => target.center = Some(point(&value)?),
                "--out" => target.out = Some(PathBuf::from(value)),
                _ => return Err(DriverError::Usage(format!("unknown flag `{arg}`"))),
            }
        }

        parsed.ok_or_else(|| DriverError::Usage("missing catalog path".into()))
    }
}

fn number<T: std::str::FromStr>(flag: &str, value: &str) -> Result<T, DriverError> {
    value
        .parse()
        .map_err(|_| DriverError::Usage(format!("`{flag}` expects a number, got `{value}`")))
}

fn point(value: &str) -> Result<Vec2, DriverError> {
    let (x, z) = value
        .split_once(',')
        .ok_or_else(|| DriverError::Usage(format!("`--center` expects X,Z, got `{value}`")))?;
    Ok(Vec2::new(number("--center", x.trim())?, number("--center", z.trim())?))
}

/// Outcome of one batch run.
#[derive(Clone, Debug, PartialEq)]
pub struct BatchReport {
    /// Batch totals.
    pub summary: BatchSummary,
    /// Sites of the structures that generated.
    pub sites: Vec<Vec2>,
    /// Files written, in unit order.
    pub saved: Vec<PathBuf>,
    /// Wall time of the batch.
    pub elapsed: Duration,
}

/// Runs one batch, calling `progress` with `(completed, total)` as units
/// finish.
///
/// # Errors
///
/// Returns [`DriverError`] if the config or catalog cannot be loaded, the
/// worker pool cannot start, or a structure cannot be saved.
pub fn run_batch(args: &BatchArgs, progress: impl FnMut(usize, usize)) -> Result<BatchReport, DriverError> {
    let mut config = match &args.config {
        Some(path) => BastionConfig::load(path)?,
        None => BastionConfig::default(),
    };
    if let Some(center) = args.center {
        config.distribution.center = center;
    }

    let catalog = Arc::new(Catalog::load(&args.catalog)?);
    tracing::info!(prototypes = catalog.len(), catalog = %args.catalog.display(), "catalog ready");

    let orchestrator = ChunkOrchestrator::new(catalog, config.generator, config.orchestrator)?;
    let mut distributor = BatchDistributor::new(&orchestrator, config.distribution, config.scatter);
    distributor.on_progress(progress);

    let start = Instant::now();
    distributor.generate_all(args.count, args.radius, args.spacing, GenerationSeed::new(args.seed));
    let summary = distributor.run_to_completion();
    let elapsed = start.elapsed();

    let mut structures: Vec<_> = distributor.structures().iter().collect();
    structures.sort_by_key(|s| s.unit);

    let mut saved = Vec::new();
    if let Some(dir) = &args.out {
        std::fs::create_dir_all(dir)?;
        for structure in &structures {
            let path = structure_path(dir, structure.unit);
            structure.assignment.save_compressed(&path)?;
            saved.push(path);
        }
    }

    Ok(BatchReport {
        summary,
        sites: structures.iter().map(|s| s.site).collect(),
        saved,
        elapsed,
    })
}

fn structure_path(dir: &Path, unit: u32) -> PathBuf {
    dir.join(format!("structure_{unit:04}.bsta"))
}
