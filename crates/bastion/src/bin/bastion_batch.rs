//! # BASTION Batch
//!
//! Headless batch generation: loads a catalog, spreads structures across a
//! disk and prints progress as they finish.

use std::process::ExitCode;

use bastion::{run_batch, BatchArgs, DriverError, USAGE};

fn main() -> ExitCode {
    let args = match BatchArgs::parse(std::env::args().skip(1)) {
        Ok(args) => args,
        Err(e) => {
            eprintln!("{e}");
            eprintln!("{USAGE}");
            return ExitCode::from(2);
        }
    };

    println!("═══════════════════════════════════════════════════════════════════");
    println!("                    BASTION BATCH v{}", env!("CARGO_PKG_VERSION"));
    println!("═══════════════════════════════════════════════════════════════════");
    println!();
    println!("  Catalog:  {}", args.catalog.display());
    match &args.config {
        Some(path) => println!("  Config:   {}", path.display()),
        None => println!("  Config:   defaults"),
    }
    println!("  Batch:    {} structures, radius {}, spacing {}", args.count, args.radius, args.spacing);
    println!("  Seed:     {}", args.seed);
    println!();

    let report = match run_batch(&args, |done, total| println!("   ✓ {done}/{total}")) {
        Ok(report) => report,
        Err(e) => {
            eprintln!("   ✗ FATAL: {e}");
            return match e {
                DriverError::Usage(_) => ExitCode::from(2),
                _ => ExitCode::FAILURE,
            };
        }
    };

    let summary = report.summary;
    println!();
    println!("  Placed:   {}/{}", summary.succeeded, summary.total);
    println!("  Failed:   {}", summary.failed);
    println!("  Props:    {}", summary.props);
    println!("  Time:     {:.2?}", report.elapsed);
    for path in &report.saved {
        println!("  Saved:    {}", path.display());
    }

    if summary.failed > 0 && summary.succeeded == 0 {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
