//! # BASTION Shared
//!
//! Common types used by the procedural core and its hosts.
//!
//! ## CRITICAL RULE
//!
//! This crate must NEVER depend on a renderer, a windowing crate or any
//! engine scene graph. Positions leave the generator as plain data and the
//! host decides what to do with them.

#![deny(missing_docs)]
#![deny(unsafe_code)]

pub mod math;

pub use math::{Vec2, Vec3};
