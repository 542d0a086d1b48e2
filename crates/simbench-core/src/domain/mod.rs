//! Domain models for simbench.
//!
//! Canonical definitions for the sweep-invariant inputs of a run:
//! - `BenchmarkKind`: which benchmark module(s) to sweep
//! - `SweepAxes` / `GridPair` / `SweepPoint`: the configuration matrix
//! - `RunConfiguration`: device, fast-math, repetition and kind

pub mod axes;
pub mod kind;
pub mod run;

pub use axes::{GridPair, SweepAxes, SweepPoint};
pub use kind::BenchmarkKind;
pub use run::RunConfiguration;
