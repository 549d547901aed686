//! # BASTION
//!
//! Headless driver around the procedural crate: loads a catalog and a
//! configuration, runs one batch of structures and reports the result.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌────────────────────┐   ┌───────────────────┐
//! │  BatchArgs   │──>│  BatchDistributor  │──>│ ChunkOrchestrator │
//! │  (CLI args)  │   │  sites + progress  │<──│   worker pool     │
//! └──────────────┘   └─────────┬──────────┘   └───────────────────┘
//!                              │
//!                              v
//!                    ┌────────────────────┐
//!                    │    BatchReport     │
//!                    │ summary + .bsta    │
//!                    └────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - `batch`: Argument parsing and the batch run itself

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]

pub mod batch;

// Re-export the layers
pub use bastion_procedural as procedural;
pub use bastion_shared as shared;

pub use batch::{run_batch, BatchArgs, BatchReport, DriverError, USAGE};
